//! Validation of a [`Program`]: unique names, resolvable references, acyclicity and types.
//!
//! These are the checks an MPC runtime performs when a program is registered. Running them
//! locally lets a malformed (e.g. hand-edited, deserialized) graph fail early with a precise
//! error instead of somewhere inside the runtime.

use std::collections::HashSet;

use tracing::{Level, debug, instrument};

use crate::program::{InputId, Kind, Node, NodeId, PartyId, Program, ValueType};

/// A reason why a program is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// Two parties share the same name.
    #[error("party '{0}' is declared more than once")]
    DuplicateParty(String),
    /// Two inputs share the same name.
    #[error("input '{name}' of party '{party}' is declared more than once")]
    DuplicateInput {
        /// The party of the second declaration.
        party: String,
        /// The clashing input name.
        name: String,
    },
    /// Two outputs share the same name.
    #[error("output '{0}' is declared more than once")]
    DuplicateOutput(String),
    /// An input or output refers to a party that was never declared.
    #[error("{0} is not declared")]
    UnknownParty(PartyId),
    /// A node reads from a node that does not exist.
    #[error("{node} refers to {operand}, which does not exist")]
    DanglingNode {
        /// The node with the broken reference.
        node: NodeId,
        /// The missing operand.
        operand: NodeId,
    },
    /// An output reveals a node that does not exist.
    #[error("output '{output}' refers to {node}, which does not exist")]
    DanglingOutput {
        /// The output with the broken reference.
        output: String,
        /// The missing node.
        node: NodeId,
    },
    /// An input node refers to an input that was never declared.
    #[error("{node} reads {input}, which is not declared")]
    UnknownInput {
        /// The input node.
        node: NodeId,
        /// The missing input.
        input: InputId,
    },
    /// The node depends on its own value.
    #[error("{0} is part of a cycle")]
    Cycle(NodeId),
    /// An operand has the wrong kind of value.
    #[error("{node} expects an operand of kind {expected}, but found a {found}")]
    TypeMismatch {
        /// The node applying the operation.
        node: NodeId,
        /// The kind the operation requires.
        expected: Kind,
        /// The type of the offending operand.
        found: ValueType,
    },
}

/// What a successful check learned about the graph.
#[derive(Debug, Clone)]
pub(crate) struct Analysis {
    /// Every node, each one after all of its operands.
    pub(crate) order: Vec<NodeId>,
    /// The type of every node, indexed by node id.
    pub(crate) types: Vec<ValueType>,
}

#[instrument(level = Level::DEBUG, skip_all, err)]
pub(crate) fn analyze(prg: &Program) -> Result<Analysis, CheckError> {
    check_names(prg)?;
    check_references(prg)?;
    let order = topological_order(prg)?;
    let types = infer_types(prg, &order)?;
    debug!(
        nodes = prg.nodes().len(),
        outputs = prg.outputs().len(),
        "program is well-formed"
    );
    Ok(Analysis { order, types })
}

fn check_names(prg: &Program) -> Result<(), CheckError> {
    let mut parties = HashSet::new();
    for party in prg.parties() {
        if !parties.insert(party.name.as_str()) {
            return Err(CheckError::DuplicateParty(party.name.clone()));
        }
    }
    let mut inputs = HashSet::new();
    for input in prg.inputs() {
        let Some(party) = prg.party(input.party) else {
            return Err(CheckError::UnknownParty(input.party));
        };
        if !inputs.insert(input.name.as_str()) {
            return Err(CheckError::DuplicateInput {
                party: party.name.clone(),
                name: input.name.clone(),
            });
        }
    }
    let mut outputs = HashSet::new();
    for output in prg.outputs() {
        if prg.party(output.party).is_none() {
            return Err(CheckError::UnknownParty(output.party));
        }
        if !outputs.insert(output.name.as_str()) {
            return Err(CheckError::DuplicateOutput(output.name.clone()));
        }
    }
    Ok(())
}

fn check_references(prg: &Program) -> Result<(), CheckError> {
    let n = prg.nodes().len();
    for (i, node) in prg.nodes().iter().enumerate() {
        let id = NodeId(i as u32);
        if let Node::Input(input) = node
            && input.0 >= prg.inputs().len()
        {
            return Err(CheckError::UnknownInput {
                node: id,
                input: *input,
            });
        }
        for operand in node.operands() {
            if operand.index() >= n {
                return Err(CheckError::DanglingNode { node: id, operand });
            }
        }
    }
    for output in prg.outputs() {
        if output.node.index() >= n {
            return Err(CheckError::DanglingOutput {
                output: output.name.clone(),
                node: output.node,
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders all nodes so that operands come first, failing on the first cycle found.
///
/// Requires all references to be resolvable.
fn topological_order(prg: &Program) -> Result<Vec<NodeId>, CheckError> {
    let nodes = prg.nodes();
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        let mut stack = vec![(NodeId(root as u32), nodes[root].operands(), 0)];
        while let Some((id, operands, next)) = stack.last_mut() {
            let Some(&operand) = operands.get(*next) else {
                marks[id.index()] = Mark::Done;
                order.push(*id);
                stack.pop();
                continue;
            };
            *next += 1;
            match marks[operand.index()] {
                Mark::Done => {}
                Mark::InProgress => return Err(CheckError::Cycle(operand)),
                Mark::Unvisited => {
                    marks[operand.index()] = Mark::InProgress;
                    stack.push((operand, nodes[operand.index()].operands(), 0));
                }
            }
        }
    }
    Ok(order)
}

fn infer_types(prg: &Program, order: &[NodeId]) -> Result<Vec<ValueType>, CheckError> {
    let nodes = prg.nodes();
    let mut types = vec![ValueType::PUBLIC_INTEGER; nodes.len()];
    for &id in order {
        let expect = |operand: NodeId, expected: Kind| {
            let found = types[operand.index()];
            if found.kind == expected {
                Ok(found)
            } else {
                Err(CheckError::TypeMismatch {
                    node: id,
                    expected,
                    found,
                })
            }
        };
        let ty = match nodes[id.index()] {
            Node::Const(_) => ValueType::PUBLIC_INTEGER,
            Node::Input(_) => ValueType::SECRET_INTEGER,
            Node::Add(x, y) | Node::Sub(x, y) | Node::Mul(x, y) | Node::Div(x, y) => {
                let (x, y) = (expect(x, Kind::Integer)?, expect(y, Kind::Integer)?);
                ValueType {
                    kind: Kind::Integer,
                    secret: x.secret || y.secret,
                }
            }
            Node::GreaterOrEqual(x, y) | Node::LessOrEqual(x, y) | Node::Equals(x, y) => {
                let (x, y) = (expect(x, Kind::Integer)?, expect(y, Kind::Integer)?);
                ValueType {
                    kind: Kind::Boolean,
                    secret: x.secret || y.secret,
                }
            }
            Node::And(x, y) => {
                let (x, y) = (expect(x, Kind::Boolean)?, expect(y, Kind::Boolean)?);
                ValueType {
                    kind: Kind::Boolean,
                    secret: x.secret || y.secret,
                }
            }
            Node::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let cond = expect(cond, Kind::Boolean)?;
                let (then, otherwise) =
                    (expect(then, Kind::Integer)?, expect(otherwise, Kind::Integer)?);
                ValueType {
                    kind: Kind::Integer,
                    secret: cond.secret || then.secret || otherwise.secret,
                }
            }
        };
        types[id.index()] = ty;
    }
    Ok(types)
}
