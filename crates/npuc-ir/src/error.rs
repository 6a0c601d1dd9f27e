//! Error types for the operator graph IR.

use crate::graph::{EdgeId, NodeId};

/// Structural problems found while building, rewriting or validating a graph.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A node references an edge that was never registered.
    #[error("node '{node}' references unregistered edge {edge}")]
    DanglingEdge { node: String, edge: EdgeId },

    /// Two nodes write the same edge.
    #[error("edge {edge} produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        edge: EdgeId,
        first: String,
        second: String,
    },

    /// A node consumes an edge that is neither produced nor a graph input.
    #[error("node '{node}' consumes edge {edge} which has no producer")]
    UnproducedEdge { node: String, edge: EdgeId },

    /// A graph output is neither produced nor a graph input.
    #[error("graph output {0} has no producer")]
    UnproducedOutput(EdgeId),

    /// Wrong number of inputs or outputs for the operator version.
    #[error("node '{node}' ({op}-v{version}) expects {expected} {what}, found {found}")]
    BadArity {
        node: String,
        op: String,
        version: u32,
        what: &'static str,
        expected: String,
        found: usize,
    },

    /// An operand or result has an element type the operator cannot take.
    #[error("node '{node}' ({op}-v{version}): {reason}")]
    TypeMismatch {
        node: String,
        op: String,
        version: u32,
        reason: String,
    },

    /// The graph is not a DAG.
    #[error("graph contains a cycle ({visited} of {total} nodes visited)")]
    Cycle { visited: usize, total: usize },

    /// Two nodes share an id.
    #[error("node id {0} used more than once")]
    DuplicateNodeId(NodeId),

    /// A loaded graph uses an id outside the allocatable range.
    #[error("id {0} exceeds the maximum of {max}", max = crate::graph::MAX_ID)]
    IdOutOfRange(u32),

    /// No node with the given id exists.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A replacement subgraph is malformed.
    #[error("invalid replacement for '{node}': {reason}")]
    BadReplacement { node: String, reason: String },

    /// Graph file could not be parsed.
    #[error("graph json: {0}")]
    Json(#[from] serde_json::Error),
}
