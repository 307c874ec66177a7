//! Lowering of a program to [Garble](https://garble-lang.org/) source code.
//!
//! Garble programs have a single `main` function with one parameter per input party, and every
//! party receiving the output sees all of it. To preserve party-scoped visibility, a [`Program`] is
//! therefore lowered once per viewing party, keeping only the nodes that the party's outputs
//! depend on. All integers are `i64`.
//!
//! Note that Garble reports overflows as a panic, whereas [`crate::eval`] wraps around. Both agree
//! on every input that stays within the documented ranges.

use std::fmt::{self, Write};

use tracing::{Level, debug, instrument};

use crate::{
    check::CheckError,
    eval::InputValues,
    program::{InputId, Kind, Node, NodeId, PartyId, Program},
};

/// An error that occurred while lowering a program to Garble.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// The program is malformed.
    #[error("invalid program: {0}")]
    Check(#[from] CheckError),
    /// The party is not declared by the program.
    #[error("{0} is not declared")]
    UnknownParty(PartyId),
    /// The party does not see any output, so there is nothing to compute.
    #[error("party '{0}' does not receive any outputs")]
    NoOutputs(String),
    /// An input value required for the argument literal is missing.
    #[error("party '{party}' did not supply input '{name}'")]
    MissingInput {
        /// The party that owns the input.
        party: String,
        /// The name of the input.
        name: String,
    },
    /// The generated source was rejected by the Garble compiler.
    #[error("garble compilation failed:\n{0}")]
    Garble(String),
    /// The source could not be formatted.
    #[error("formatting error")]
    Fmt(#[from] fmt::Error),
}

/// The view of a single party, as a Garble program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarbleProgram {
    /// The Garble source code.
    pub source: String,
    /// The party supplying each argument of `main`, in parameter order.
    pub input_parties: Vec<PartyId>,
    /// The names of the outputs, in the order they are returned by `main`.
    pub outputs: Vec<String>,
}

impl GarbleProgram {
    /// Compiles the source with the Garble compiler.
    pub fn compile(&self) -> Result<garble_lang::GarbleProgram, LowerError> {
        garble_lang::compile(&self.source).map_err(|e| LowerError::Garble(e.prettify(&self.source)))
    }
}

fn var(node: NodeId) -> String {
    format!("n{}", node.0)
}

fn input_var(input: InputId) -> String {
    format!("in{}", input.0)
}

fn int_literal(value: i64) -> String {
    if value == i64::MIN {
        format!("({}i64 - 1i64)", i64::MIN + 1)
    } else {
        format!("{value}i64")
    }
}

fn type_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Integer => "i64",
        Kind::Boolean => "bool",
    }
}

/// Wraps the items in a tuple, unless there is exactly one.
fn tuple(items: &[String]) -> String {
    match items {
        [single] => single.clone(),
        items => format!("({})", items.join(", ")),
    }
}

/// The parties that own at least one input, i.e. the parameters of `main`.
fn input_parties(prg: &Program) -> Vec<PartyId> {
    (0..prg.parties().len())
        .map(PartyId)
        .filter(|p| prg.inputs_of(*p).next().is_some())
        .collect()
}

/// Lowers the part of `prg` that is visible to `viewer`.
#[instrument(level = Level::DEBUG, skip(prg), err)]
pub fn lower(prg: &Program, viewer: PartyId) -> Result<GarbleProgram, LowerError> {
    let analysis = prg.analyze()?;
    let Some(party) = prg.party(viewer) else {
        return Err(LowerError::UnknownParty(viewer));
    };
    let outputs: Vec<_> = prg.outputs_for(viewer).collect();
    if outputs.is_empty() {
        return Err(LowerError::NoOutputs(party.name.clone()));
    }

    let mut reachable = vec![false; prg.nodes().len()];
    let mut stack: Vec<NodeId> = outputs.iter().map(|o| o.node).collect();
    while let Some(node) = stack.pop() {
        if !reachable[node.index()] {
            reachable[node.index()] = true;
            stack.extend(prg.nodes()[node.index()].operands());
        }
    }
    let mut used_inputs = vec![false; prg.inputs().len()];
    for (node, _) in reachable.iter().enumerate().filter(|(_, r)| **r) {
        if let Node::Input(input) = prg.nodes()[node] {
            used_inputs[input.0] = true;
        }
    }

    let input_parties = input_parties(prg);
    let mut params = vec![];
    let mut body = String::new();
    for &p in input_parties.iter() {
        let param = format!("party_{}", p.0);
        let mut types = vec![];
        let mut patterns = vec![];
        for (input, _) in prg.inputs_of(p) {
            types.push("i64".to_string());
            patterns.push(if used_inputs[input.0] {
                input_var(input)
            } else {
                "_".to_string()
            });
        }
        writeln!(body, "    let {} = {param};", tuple(&patterns))?;
        params.push(format!("{param}: {}", tuple(&types)));
    }

    for &node in analysis.order.iter().filter(|n| reachable[n.index()]) {
        let expr = match prg.nodes()[node.index()] {
            Node::Const(c) => int_literal(c),
            Node::Input(input) => input_var(input),
            Node::Add(x, y) => format!("{} + {}", var(x), var(y)),
            Node::Sub(x, y) => format!("{} - {}", var(x), var(y)),
            Node::Mul(x, y) => format!("{} * {}", var(x), var(y)),
            Node::Div(x, y) => format!("{} / {}", var(x), var(y)),
            Node::GreaterOrEqual(x, y) => format!("{} >= {}", var(x), var(y)),
            Node::LessOrEqual(x, y) => format!("{} <= {}", var(x), var(y)),
            Node::Equals(x, y) => format!("{} == {}", var(x), var(y)),
            Node::And(x, y) => format!("{} & {}", var(x), var(y)),
            Node::IfElse {
                cond,
                then,
                otherwise,
            } => format!(
                "if {} {{ {} }} else {{ {} }}",
                var(cond),
                var(then),
                var(otherwise)
            ),
        };
        writeln!(body, "    let {} = {expr};", var(node))?;
    }

    let result: Vec<_> = outputs.iter().map(|o| var(o.node)).collect();
    let result_types: Vec<_> = outputs
        .iter()
        .map(|o| type_name(analysis.types[o.node.index()].kind).to_string())
        .collect();

    let mut source = String::new();
    writeln!(source, "// outputs of '{}'", party.name)?;
    writeln!(
        source,
        "pub fn main({}) -> {} {{",
        params.join(", "),
        tuple(&result_types)
    )?;
    source.push_str(&body);
    writeln!(source, "    {}", tuple(&result))?;
    writeln!(source, "}}")?;

    debug!(
        party = %party.name,
        nodes = reachable.iter().filter(|r| **r).count(),
        "lowered program to garble"
    );
    Ok(GarbleProgram {
        source,
        input_parties,
        outputs: outputs.iter().map(|o| o.name.clone()).collect(),
    })
}

/// Lowers the view of every party that receives at least one output, by party name.
pub fn lower_all(prg: &Program) -> Result<Vec<(String, GarbleProgram)>, LowerError> {
    let mut programs = vec![];
    for (i, party) in prg.parties().iter().enumerate() {
        let id = PartyId(i);
        if prg.outputs_for(id).next().is_some() {
            programs.push((party.name.clone(), lower(prg, id)?));
        }
    }
    Ok(programs)
}

/// Renders the inputs of `party` as the Garble literal of its `main` argument.
pub fn input_literal(
    prg: &Program,
    party: PartyId,
    inputs: &InputValues,
) -> Result<String, LowerError> {
    let Some(name) = prg.party(party).map(|p| p.name.as_str()) else {
        return Err(LowerError::UnknownParty(party));
    };
    let mut values = vec![];
    for (_, input) in prg.inputs_of(party) {
        let Some(value) = inputs.get(name, &input.name) else {
            return Err(LowerError::MissingInput {
                party: name.to_string(),
                name: input.name.clone(),
            });
        };
        values.push(int_literal(value));
    }
    Ok(tuple(&values))
}
