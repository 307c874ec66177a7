//! Plaintext reference evaluation of a [`Program`].
//!
//! This computes exactly what an MPC runtime reveals, but on cleartext values. Integers are 64 bit
//! two's complement and wrap on overflow, like the fixed-width circuits a runtime evaluates, and
//! division truncates towards zero. Nothing is clamped: a result outside the expected range is
//! returned as is.

use std::{collections::BTreeMap, fmt};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
};
use tracing::{Level, debug, instrument};

use crate::{
    check::CheckError,
    program::{Node, NodeId, PartyId, Program},
};

/// An error that occurred while evaluating a program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The program is malformed.
    #[error("invalid program: {0}")]
    Check(#[from] CheckError),
    /// Inputs were supplied for a party that the program does not declare.
    #[error("unknown party '{0}'")]
    UnknownParty(String),
    /// A declared input was not supplied.
    #[error("party '{party}' did not supply input '{name}'")]
    MissingInput {
        /// The party that owns the input.
        party: String,
        /// The name of the input.
        name: String,
    },
    /// A value was supplied for an input that the party does not own.
    #[error("party '{party}' supplied '{name}', which is not one of its inputs")]
    UnexpectedInput {
        /// The party that supplied the value.
        party: String,
        /// The name of the value.
        name: String,
    },
    /// The divisor of a division was zero.
    #[error("division by zero at {0}")]
    DivisionByZero(NodeId),
}

/// The cleartext input values of all parties: party name -> input name -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputValues(BTreeMap<String, BTreeMap<String, i64>>);

impl InputValues {
    /// No inputs for any party.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of the input `name` of `party`.
    pub fn set(&mut self, party: impl Into<String>, name: impl Into<String>, value: i64) {
        self.0
            .entry(party.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Builder-style version of [`InputValues::set`].
    pub fn with(mut self, party: impl Into<String>, name: impl Into<String>, value: i64) -> Self {
        self.set(party, name, value);
        self
    }

    /// The value of the input `name` of `party`, if supplied.
    pub fn get(&self, party: &str, name: &str) -> Option<i64> {
        self.0.get(party)?.get(name).copied()
    }

    /// The values supplied by a single party.
    pub fn of(&self, party: &str) -> BTreeMap<String, i64> {
        self.0.get(party).cloned().unwrap_or_default()
    }

    /// The names of all parties that supplied at least one value.
    pub fn parties(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A cleartext value of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// An integer result.
    Integer(i64),
    /// A boolean result.
    Boolean(bool),
}

impl Value {
    /// The integer, with booleans read as 0 or 1.
    pub fn as_integer(self) -> i64 {
        match self {
            Value::Integer(i) => i,
            Value::Boolean(b) => b as i64,
        }
    }

    /// The boolean, with integers read as `!= 0`.
    pub fn as_bool(self) -> bool {
        match self {
            Value::Integer(i) => i != 0,
            Value::Boolean(b) => b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// The outputs delivered to a single party, in the order they were declared.
///
/// Serialized as a map from output name to value, keeping that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyOutputs(pub Vec<(String, Value)>);

impl PartyOutputs {
    /// The output with the given name, if it is visible to this party.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(output, _)| output == name)
            .map(|(_, value)| *value)
    }

    /// The names of the outputs, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// The number of outputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the party sees no outputs at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PartyOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
    }
}

impl<'de> Deserialize<'de> for PartyOutputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutputsVisitor;

        impl<'de> Visitor<'de> for OutputsVisitor {
            type Value = PartyOutputs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from output names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PartyOutputs, A::Error> {
                let mut outputs = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some((name, value)) = map.next_entry()? {
                    outputs.push((name, value));
                }
                Ok(PartyOutputs(outputs))
            }
        }

        deserializer.deserialize_map(OutputsVisitor)
    }
}

/// The result of evaluating a program.
#[derive(Debug, Clone)]
pub struct Evaluation {
    values: Vec<Value>,
    parties: Vec<String>,
    outputs: Vec<(PartyId, String, Value)>,
}

impl Evaluation {
    /// The value of any node, including intermediate ones.
    pub fn value(&self, node: NodeId) -> Option<Value> {
        self.values.get(node.index()).copied()
    }

    /// The outputs bound to `party`, and nothing else.
    pub fn view(&self, party: PartyId) -> PartyOutputs {
        PartyOutputs(
            self.outputs
                .iter()
                .filter(|(p, _, _)| *p == party)
                .map(|(_, name, value)| (name.clone(), *value))
                .collect(),
        )
    }

    /// The view of every party, by party name.
    pub fn views(&self) -> BTreeMap<String, PartyOutputs> {
        self.parties
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), self.view(PartyId(i))))
            .collect()
    }
}

/// Checks that `inputs` supplies exactly the inputs declared by `prg`.
pub(crate) fn check_inputs(prg: &Program, inputs: &InputValues) -> Result<(), EvalError> {
    for party in inputs.parties() {
        let Some(id) = prg.party_id(party) else {
            return Err(EvalError::UnknownParty(party.to_string()));
        };
        for name in inputs.of(party).keys() {
            if !prg.inputs_of(id).any(|(_, input)| &input.name == name) {
                return Err(EvalError::UnexpectedInput {
                    party: party.to_string(),
                    name: name.clone(),
                });
            }
        }
    }
    for input in prg.inputs() {
        let party = prg
            .party(input.party)
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        if inputs.get(party, &input.name).is_none() {
            return Err(EvalError::MissingInput {
                party: party.to_string(),
                name: input.name.clone(),
            });
        }
    }
    Ok(())
}

/// Evaluates every node of the program on cleartext inputs.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub fn evaluate(prg: &Program, inputs: &InputValues) -> Result<Evaluation, EvalError> {
    let analysis = prg.analyze()?;
    check_inputs(prg, inputs)?;

    let nodes = prg.nodes();
    let mut values = vec![Value::Integer(0); nodes.len()];
    for id in analysis.order {
        let int = |n: NodeId| values[n.index()].as_integer();
        let flag = |n: NodeId| values[n.index()].as_bool();
        let value = match nodes[id.index()] {
            Node::Const(c) => Value::Integer(c),
            Node::Input(input) => {
                let input = &prg.inputs()[input.0];
                let party = prg
                    .party(input.party)
                    .map(|p| p.name.as_str())
                    .unwrap_or_default();
                Value::Integer(inputs.get(party, &input.name).unwrap_or_default())
            }
            Node::Add(x, y) => Value::Integer(int(x).wrapping_add(int(y))),
            Node::Sub(x, y) => Value::Integer(int(x).wrapping_sub(int(y))),
            Node::Mul(x, y) => Value::Integer(int(x).wrapping_mul(int(y))),
            Node::Div(x, y) => {
                let divisor = int(y);
                if divisor == 0 {
                    return Err(EvalError::DivisionByZero(id));
                }
                Value::Integer(int(x).wrapping_div(divisor))
            }
            Node::GreaterOrEqual(x, y) => Value::Boolean(int(x) >= int(y)),
            Node::LessOrEqual(x, y) => Value::Boolean(int(x) <= int(y)),
            Node::Equals(x, y) => Value::Boolean(int(x) == int(y)),
            Node::And(x, y) => Value::Boolean(flag(x) && flag(y)),
            Node::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if flag(cond) {
                    values[then.index()]
                } else {
                    values[otherwise.index()]
                }
            }
        };
        values[id.index()] = value;
    }

    let outputs = prg
        .outputs()
        .iter()
        .map(|o| (o.party, o.name.clone(), values[o.node.index()]))
        .collect();
    debug!(nodes = values.len(), "evaluated program");
    Ok(Evaluation {
        values,
        parties: prg.parties().iter().map(|p| p.name.clone()).collect(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;

    fn arithmetic() -> (Program, [NodeId; 4]) {
        let mut b = ProgramBuilder::new();
        let a = b.party("a");
        let z = b.party("z");
        let x = b.secret_integer("x", a);
        let y = b.secret_integer("y", z);
        let sum = b.add(x, y);
        let diff = b.sub(x, y);
        let prod = b.mul(x, y);
        let quot = b.div(x, y);
        b.output(quot, "quot", a);
        b.output(sum, "sum", z);
        (b.build(), [sum, diff, prod, quot])
    }

    #[test]
    fn integer_arithmetic() {
        let (prg, [sum, diff, prod, quot]) = arithmetic();
        let inputs = InputValues::new().with("a", "x", -7).with("z", "y", 2);
        let eval = evaluate(&prg, &inputs).unwrap();
        assert_eq!(eval.value(sum), Some(Value::Integer(-5)));
        assert_eq!(eval.value(diff), Some(Value::Integer(-9)));
        assert_eq!(eval.value(prod), Some(Value::Integer(-14)));
        // truncation, not flooring:
        assert_eq!(eval.value(quot), Some(Value::Integer(-3)));
    }

    #[test]
    fn overflow_wraps() {
        let (prg, [sum, _, prod, quot]) = arithmetic();
        let inputs = InputValues::new()
            .with("a", "x", i64::MAX)
            .with("z", "y", 2);
        let eval = evaluate(&prg, &inputs).unwrap();
        assert_eq!(eval.value(sum), Some(Value::Integer(i64::MIN + 1)));
        assert_eq!(eval.value(prod), Some(Value::Integer(-2)));
        assert_eq!(eval.value(quot), Some(Value::Integer(i64::MAX / 2)));

        let inputs = InputValues::new()
            .with("a", "x", i64::MIN)
            .with("z", "y", -1);
        let eval = evaluate(&prg, &inputs).unwrap();
        assert_eq!(eval.value(quot), Some(Value::Integer(i64::MIN)));
    }

    #[test]
    fn division_by_zero() {
        let (prg, [.., quot]) = arithmetic();
        let inputs = InputValues::new().with("a", "x", 1).with("z", "y", 0);
        assert_eq!(
            evaluate(&prg, &inputs).unwrap_err(),
            EvalError::DivisionByZero(quot)
        );
    }

    #[test]
    fn views_are_party_scoped() {
        let (prg, _) = arithmetic();
        let inputs = InputValues::new().with("a", "x", 9).with("z", "y", 3);
        let eval = evaluate(&prg, &inputs).unwrap();
        let a = eval.view(PartyId(0));
        let z = eval.view(PartyId(1));
        assert_eq!(a.len(), 1);
        assert_eq!(a.get("quot"), Some(Value::Integer(3)));
        assert_eq!(a.get("sum"), None);
        assert_eq!(z.get("sum"), Some(Value::Integer(12)));
        assert_eq!(eval.views().len(), 2);
        assert!(eval.view(PartyId(5)).is_empty());
    }

    #[test]
    fn views_keep_declaration_order() {
        let mut b = ProgramBuilder::new();
        let a = b.party("a");
        let x = b.secret_integer("x", a);
        let two = b.integer(2);
        let double = b.mul(x, two);
        b.output(double, "zeta", a);
        b.output(x, "alpha", a);
        b.output(two, "mid", a);
        let prg = b.build();
        let eval = evaluate(&prg, &InputValues::new().with("a", "x", 4)).unwrap();
        let view = eval.view(a);
        let names: Vec<_> = view.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"zeta":8,"alpha":4,"mid":2}"#
        );
    }

    #[test]
    fn inputs_must_match_declarations() {
        let (prg, _) = arithmetic();
        let missing = InputValues::new().with("a", "x", 1);
        assert_eq!(
            evaluate(&prg, &missing).unwrap_err(),
            EvalError::MissingInput {
                party: "z".into(),
                name: "y".into()
            }
        );

        let misplaced = InputValues::new().with("a", "x", 1).with("a", "y", 1);
        assert_eq!(
            evaluate(&prg, &misplaced).unwrap_err(),
            EvalError::UnexpectedInput {
                party: "a".into(),
                name: "y".into()
            }
        );

        let stranger = InputValues::new().with("mallory", "x", 1);
        assert_eq!(
            evaluate(&prg, &stranger).unwrap_err(),
            EvalError::UnknownParty("mallory".into())
        );
    }

    #[test]
    fn malformed_programs_are_not_evaluated() {
        let mut b = ProgramBuilder::new();
        let a = b.party("a");
        b.secret_integer("x", a);
        b.secret_integer("x", a);
        let err = evaluate(&b.build(), &InputValues::new().with("a", "x", 1)).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Check(CheckError::DuplicateInput { .. })
        ));
    }

    #[test]
    fn boolean_operations() {
        let mut b = ProgramBuilder::new();
        let a = b.party("a");
        let x = b.secret_integer("x", a);
        let lo = b.integer(1);
        let hi = b.integer(10);
        let ge = b.greater_or_equal(x, lo);
        let le = b.less_or_equal(x, hi);
        let both = b.and(ge, le);
        b.output(both, "in_range", a);
        let prg = b.build();
        for (x, expected) in [(0, false), (1, true), (5, true), (10, true), (11, false)] {
            let eval = evaluate(&prg, &InputValues::new().with("a", "x", x)).unwrap();
            assert_eq!(eval.value(both), Some(Value::Boolean(expected)), "x = {x}");
        }
    }

    #[test]
    fn values_serialize_untagged() {
        let outputs = PartyOutputs(vec![
            ("score".to_string(), Value::Integer(-20)),
            ("flag".to_string(), Value::Boolean(true)),
        ]);
        let json = serde_json::to_string(&outputs).unwrap();
        assert_eq!(json, r#"{"score":-20,"flag":true}"#);
        let parsed: PartyOutputs = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outputs);
        let inputs: InputValues = serde_json::from_str(r#"{"a": {"x": 3}}"#).unwrap();
        assert_eq!(inputs.get("a", "x"), Some(3));
    }
}
