//! The computation graph: parties, their secret inputs, the expression DAG and party-scoped
//! outputs.
//!
//! A [`Program`] is plain data. It is normally produced by a
//! [`ProgramBuilder`](crate::builder::ProgramBuilder), but can also be deserialized, which is why
//! nothing here assumes that the graph is well-formed. Use [`Program::check`] before relying on
//! that.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::check::{self, Analysis, CheckError};

/// The index of a party in the order of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(pub usize);

/// The index of a secret input in the order of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InputId(pub usize);

/// A handle to a node of the expression DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party #{}", self.0)
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input #{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// A participant of the computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// The name under which the runtime binds inputs and delivers outputs.
    pub name: String,
}

/// A secret integer supplied by exactly one party when the program is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInput {
    /// The name of the input, unique within the program.
    pub name: String,
    /// The party that owns and supplies the input.
    pub party: PartyId,
}

/// A node of the expression DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    /// A public integer constant.
    Const(i64),
    /// The value of a secret input.
    Input(InputId),
    /// `lhs + rhs`
    Add(NodeId, NodeId),
    /// `lhs - rhs`
    Sub(NodeId, NodeId),
    /// `lhs * rhs`
    Mul(NodeId, NodeId),
    /// `lhs / rhs`, truncating towards zero.
    Div(NodeId, NodeId),
    /// `lhs >= rhs`
    GreaterOrEqual(NodeId, NodeId),
    /// `lhs <= rhs`
    LessOrEqual(NodeId, NodeId),
    /// `lhs == rhs`
    Equals(NodeId, NodeId),
    /// Logical conjunction of two booleans.
    And(NodeId, NodeId),
    /// Selects `then` if `cond` holds, otherwise `otherwise`.
    IfElse {
        /// The (boolean) condition.
        cond: NodeId,
        /// The value if the condition holds.
        then: NodeId,
        /// The value if the condition does not hold.
        otherwise: NodeId,
    },
}

impl Node {
    /// The nodes this node reads from, in operand order.
    pub fn operands(&self) -> Vec<NodeId> {
        match *self {
            Node::Const(_) | Node::Input(_) => vec![],
            Node::Add(x, y)
            | Node::Sub(x, y)
            | Node::Mul(x, y)
            | Node::Div(x, y)
            | Node::GreaterOrEqual(x, y)
            | Node::LessOrEqual(x, y)
            | Node::Equals(x, y)
            | Node::And(x, y) => vec![x, y],
            Node::IfElse {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
        }
    }
}

/// Whether a value is an integer or a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// A (64-bit, signed) integer.
    Integer,
    /// A boolean.
    Boolean,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Integer => f.write_str("integer"),
            Kind::Boolean => f.write_str("boolean"),
        }
    }
}

/// The type of a node: its kind and whether it depends on any secret input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Integer or boolean.
    pub kind: Kind,
    /// `true` if the value is derived from at least one secret input.
    pub secret: bool,
}

impl ValueType {
    /// A secret integer, the type of every [`SecretInput`].
    pub const SECRET_INTEGER: ValueType = ValueType {
        kind: Kind::Integer,
        secret: true,
    };

    /// A public integer, the type of every constant.
    pub const PUBLIC_INTEGER: ValueType = ValueType {
        kind: Kind::Integer,
        secret: false,
    };
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visibility = if self.secret { "secret" } else { "public" };
        write!(f, "{visibility} {}", self.kind)
    }
}

/// A named result of the computation, visible to exactly one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// The name under which the result is delivered, unique within the program.
    pub name: String,
    /// The node whose value is revealed.
    pub node: NodeId,
    /// The only party that sees the result.
    pub party: PartyId,
}

/// A complete computation graph, ready to be handed over to an MPC runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    parties: Vec<Party>,
    inputs: Vec<SecretInput>,
    nodes: Vec<Node>,
    outputs: Vec<Output>,
}

impl Program {
    /// Assembles a program from its parts without validating it.
    pub fn from_parts(
        parties: Vec<Party>,
        inputs: Vec<SecretInput>,
        nodes: Vec<Node>,
        outputs: Vec<Output>,
    ) -> Self {
        Self {
            parties,
            inputs,
            nodes,
            outputs,
        }
    }

    /// All parties, indexed by [`PartyId`].
    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    /// All secret inputs, indexed by [`InputId`].
    pub fn inputs(&self) -> &[SecretInput] {
        &self.inputs
    }

    /// All nodes of the expression DAG, indexed by [`NodeId`].
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The output declarations in the order they were declared.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Looks up a party by id.
    pub fn party(&self, id: PartyId) -> Option<&Party> {
        self.parties.get(id.0)
    }

    /// Looks up a party by name.
    pub fn party_id(&self, name: &str) -> Option<PartyId> {
        self.parties.iter().position(|p| p.name == name).map(PartyId)
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// The inputs owned by the given party, in declaration order.
    pub fn inputs_of(&self, party: PartyId) -> impl Iterator<Item = (InputId, &SecretInput)> {
        self.inputs
            .iter()
            .enumerate()
            .filter(move |(_, input)| input.party == party)
            .map(|(i, input)| (InputId(i), input))
    }

    /// The outputs visible to the given party, in declaration order.
    pub fn outputs_for(&self, party: PartyId) -> impl Iterator<Item = &Output> {
        self.outputs.iter().filter(move |o| o.party == party)
    }

    /// Validates names, references, acyclicity and types.
    pub fn check(&self) -> Result<(), CheckError> {
        self.analyze().map(|_| ())
    }

    pub(crate) fn analyze(&self) -> Result<Analysis, CheckError> {
        check::analyze(self)
    }

    /// The BLAKE3 hash of the program's bincode encoding, as a hex string.
    ///
    /// Parties compare fingerprints to make sure that they are about to run the same program.
    pub fn fingerprint(&self) -> Result<String, bincode::Error> {
        let bytes = bincode::serialize(self)?;
        Ok(blake3::hash(&bytes).to_string())
    }
}
