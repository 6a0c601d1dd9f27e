//! Node replacement: splicing a subgraph in place of a single node.

use std::collections::HashSet;

use crate::error::IrError;
use crate::graph::{EdgeId, GraphNode, NodeId, OperatorGraph, TensorInfo};
use crate::op::OpKind;

/// Reference to a tensor from inside a [`Replacement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortRef {
    /// The i-th input edge of the node being replaced.
    Input(usize),
    /// The i-th output edge of the node being replaced.
    Output(usize),
    /// The i-th edge declared in [`Replacement::edges`].
    Local(usize),
}

/// A node of a replacement subgraph.
#[derive(Clone, Debug)]
pub struct ReplacementNode {
    pub op: OpKind,
    pub version: u32,
    pub inputs: Vec<PortRef>,
    pub outputs: Vec<PortRef>,
    pub name: String,
}

/// A subgraph that stands in for one node.
///
/// External ports bind to the replaced node's edges, so producers and
/// consumers outside the subgraph keep their edge ids.
#[derive(Clone, Debug, Default)]
pub struct Replacement {
    /// Edges internal to the subgraph.
    pub edges: Vec<TensorInfo>,
    /// Nodes in declaration order.
    pub nodes: Vec<ReplacementNode>,
}

impl Replacement {
    /// Declare an internal edge and return a reference to it.
    pub fn edge(&mut self, info: TensorInfo) -> PortRef {
        self.edges.push(info);
        PortRef::Local(self.edges.len() - 1)
    }

    /// Append a node with a single output.
    pub fn node(
        &mut self,
        op: OpKind,
        version: u32,
        inputs: Vec<PortRef>,
        output: PortRef,
        name: impl Into<String>,
    ) {
        self.nodes.push(ReplacementNode {
            op,
            version,
            inputs,
            outputs: vec![output],
            name: name.into(),
        });
    }
}

impl OperatorGraph {
    /// Replace node `id` with `replacement`.
    ///
    /// Internal edges and nodes receive fresh ids in declaration order. Every
    /// output of the replaced node must be produced by exactly one new node.
    /// The graph is left untouched if the replacement is rejected.
    ///
    /// Returns the ids of the inserted nodes.
    pub fn replace_node(
        &mut self,
        id: NodeId,
        replacement: Replacement,
    ) -> Result<Vec<NodeId>, IrError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(IrError::UnknownNode(id))?;
        let old = &self.nodes[pos];
        let bad = |reason: String| IrError::BadReplacement {
            node: old.name.clone(),
            reason,
        };

        let first_edge = self.next_edge_id;
        let resolve = |port: PortRef, as_output: bool| -> Result<EdgeId, IrError> {
            match port {
                PortRef::Input(i) if !as_output => old
                    .inputs
                    .get(i)
                    .copied()
                    .ok_or_else(|| bad(format!("input port {i} out of range"))),
                PortRef::Output(i) if as_output => old
                    .outputs
                    .get(i)
                    .copied()
                    .ok_or_else(|| bad(format!("output port {i} out of range"))),
                PortRef::Local(i) if i < replacement.edges.len() => {
                    Ok(EdgeId(first_edge + i as u32))
                }
                other => Err(bad(format!(
                    "{other:?} cannot be used as {}",
                    if as_output { "an output" } else { "an input" }
                ))),
            }
        };

        let mut produced = HashSet::new();
        let mut new_nodes = Vec::with_capacity(replacement.nodes.len());
        for (i, rn) in replacement.nodes.iter().enumerate() {
            let inputs = rn
                .inputs
                .iter()
                .map(|&p| resolve(p, false))
                .collect::<Result<Vec<_>, _>>()?;
            let outputs = rn
                .outputs
                .iter()
                .map(|&p| resolve(p, true))
                .collect::<Result<Vec<_>, _>>()?;
            for &out in &outputs {
                if !produced.insert(out) {
                    return Err(bad(format!("edge {out} produced twice")));
                }
            }
            new_nodes.push(GraphNode {
                id: NodeId(self.next_node_id + i as u32),
                op: rn.op.clone(),
                version: rn.version,
                inputs,
                outputs,
                name: rn.name.clone(),
            });
        }

        if let Some(&missing) = old.outputs.iter().find(|e| !produced.contains(e)) {
            return Err(bad(format!("output {missing} is not produced")));
        }

        for info in replacement.edges {
            self.add_edge(info);
        }
        self.next_node_id += new_nodes.len() as u32;
        let ids = new_nodes.iter().map(|n| n.id).collect();
        self.nodes.splice(pos..=pos, new_nodes);
        Ok(ids)
    }
}
