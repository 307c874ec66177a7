//! An explicit builder for computation graphs.
//!
//! Every operation appends a node to the graph and returns a [`NodeId`] handle that can be used
//! as an operand of later operations. Building never fails: name clashes and type errors are
//! reported by [`Program::check`], just like an MPC runtime would report them when the program is
//! registered.

use std::collections::HashMap;

use tracing::debug;

use crate::program::{InputId, Node, NodeId, Output, Party, PartyId, Program, SecretInput};

/// Builder for a [`Program`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    parties: Vec<Party>,
    inputs: Vec<SecretInput>,
    nodes: Vec<Node>,
    outputs: Vec<Output>,
    /// Constant pool: value -> unique `Const` node.
    consts: HashMap<i64, NodeId>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Declares a party.
    pub fn party(&mut self, name: impl Into<String>) -> PartyId {
        let id = PartyId(self.parties.len());
        self.parties.push(Party { name: name.into() });
        id
    }

    /// Declares a secret integer supplied by `party` and returns the node reading it.
    pub fn secret_integer(&mut self, name: impl Into<String>, party: PartyId) -> NodeId {
        let input = InputId(self.inputs.len());
        self.inputs.push(SecretInput {
            name: name.into(),
            party,
        });
        self.push(Node::Input(input))
    }

    /// A public integer constant. Constants are deduplicated.
    pub fn integer(&mut self, value: i64) -> NodeId {
        if let Some(id) = self.consts.get(&value) {
            return *id;
        }
        let id = self.push(Node::Const(value));
        self.consts.insert(value, id);
        id
    }

    /// `lhs + rhs`
    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Add(lhs, rhs))
    }

    /// `lhs - rhs`
    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Sub(lhs, rhs))
    }

    /// `lhs * rhs`
    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Mul(lhs, rhs))
    }

    /// `lhs / rhs`, truncating towards zero.
    ///
    /// Integer division loses the remainder, so scale the dividend first (multiply, then divide).
    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Div(lhs, rhs))
    }

    /// `lhs >= rhs`
    pub fn greater_or_equal(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::GreaterOrEqual(lhs, rhs))
    }

    /// `lhs <= rhs`
    pub fn less_or_equal(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::LessOrEqual(lhs, rhs))
    }

    /// `lhs == rhs`
    pub fn equals(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Equals(lhs, rhs))
    }

    /// Logical conjunction of two booleans.
    pub fn and(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::And(lhs, rhs))
    }

    /// `then` if `cond` holds, otherwise `otherwise`.
    pub fn if_else(&mut self, cond: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        self.push(Node::IfElse {
            cond,
            then,
            otherwise,
        })
    }

    /// Coerces a boolean into the integer 1 (true) or 0 (false).
    pub fn to_indicator(&mut self, cond: NodeId) -> NodeId {
        let one = self.integer(1);
        let zero = self.integer(0);
        self.if_else(cond, one, zero)
    }

    /// Reveals `node` under `name` to `party` (and to no one else).
    pub fn output(&mut self, node: NodeId, name: impl Into<String>, party: PartyId) {
        self.outputs.push(Output {
            name: name.into(),
            node,
            party,
        });
    }

    /// Finishes the graph.
    pub fn build(self) -> Program {
        debug!(
            parties = self.parties.len(),
            inputs = self.inputs.len(),
            nodes = self.nodes.len(),
            outputs = self.outputs.len(),
            "built program"
        );
        Program::from_parts(self.parties, self.inputs, self.nodes, self.outputs)
    }
}
