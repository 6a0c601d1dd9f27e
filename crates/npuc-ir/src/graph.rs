//! Operator graph: a DAG of versioned operator nodes connected by tensor edges.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::op::OpKind;
use crate::types::{Scalar, TensorShape};

/// Largest node or edge id a loaded graph may use, leaving room for
/// rewrites to allocate fresh ids.
pub const MAX_ID: u32 = i32::MAX as u32;

/// A unique identifier for a node in the graph.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// A unique identifier for an edge (tensor) in the graph.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Metadata about a tensor edge in the graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    /// Human-readable name.
    pub name: String,
    /// Element type.
    pub scalar: Scalar,
    /// Shape (may contain dynamic dimensions).
    pub shape: TensorShape,
}

impl TensorInfo {
    pub fn new(name: impl Into<String>, scalar: Scalar, shape: TensorShape) -> Self {
        Self {
            name: name.into(),
            scalar,
            shape,
        }
    }
}

/// A node in the operator graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// The operation this node performs.
    pub op: OpKind,
    /// Opset version of the operator (e.g. 11 for Interpolate-11).
    pub version: u32,
    /// Input edge identifiers (ordered).
    pub inputs: Vec<EdgeId>,
    /// Output edge identifiers (ordered).
    pub outputs: Vec<EdgeId>,
    /// Human-readable name for this node.
    pub name: String,
}

impl GraphNode {
    /// The OpenVINO type string of the node's operator.
    pub fn op_type(&self) -> &str {
        self.op.type_name()
    }
}

/// A directed acyclic graph of versioned operators.
///
/// Graph inputs are edges without a producer listed in `inputs`; literals
/// are `Constant` nodes. Each edge has at most one producer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorGraph {
    /// All nodes, in insertion order.
    pub nodes: Vec<GraphNode>,
    /// All tensor edges, ordered by id.
    pub edges: BTreeMap<EdgeId, TensorInfo>,
    /// Graph-level input edges (model inputs).
    pub inputs: Vec<EdgeId>,
    /// Graph-level output edges (model outputs).
    pub outputs: Vec<EdgeId>,
    /// Next available node id.
    #[serde(skip)]
    pub(crate) next_node_id: u32,
    /// Next available edge id.
    #[serde(skip)]
    pub(crate) next_edge_id: u32,
}

impl OperatorGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tensor edge to the graph and return its id.
    pub fn add_edge(&mut self, info: TensorInfo) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.insert(id, info);
        id
    }

    /// Add a node to the graph and return its id.
    ///
    /// Fails if any input or output [`EdgeId`] has not been registered via
    /// [`add_edge`](Self::add_edge), or if an output edge already has a
    /// producer.
    pub fn add_node(
        &mut self,
        op: OpKind,
        version: u32,
        inputs: Vec<EdgeId>,
        outputs: Vec<EdgeId>,
        name: impl Into<String>,
    ) -> Result<NodeId, IrError> {
        let name = name.into();

        for &e in inputs.iter().chain(outputs.iter()) {
            if !self.edges.contains_key(&e) {
                return Err(IrError::DanglingEdge {
                    node: name,
                    edge: e,
                });
            }
        }

        for &out in &outputs {
            if let Some(existing) = self.edge_producer(out) {
                return Err(IrError::DuplicateProducer {
                    edge: out,
                    first: existing.name.clone(),
                    second: name,
                });
            }
        }

        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.push(GraphNode {
            id,
            op,
            version,
            inputs,
            outputs,
            name,
        });
        Ok(id)
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges (tensors) in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&TensorInfo> {
        self.edges.get(&id)
    }

    /// Returns nodes in topological order.
    ///
    /// The ordering is deterministic: among ready nodes, the one with the
    /// smaller [`NodeId`] is emitted first.
    pub fn topological_order(&self) -> Result<Vec<&GraphNode>, IrError> {
        let mut edge_producer: HashMap<EdgeId, usize> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for &out in &node.outputs {
                edge_producer.insert(out, i);
            }
        }

        // Per-node consumer lists and in-degree (O(V+E))
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (ci, node) in self.nodes.iter().enumerate() {
            for &inp in &node.inputs {
                if let Some(&pi) = edge_producer.get(&inp) {
                    in_degree[ci] += 1;
                    consumers[pi].push(ci);
                }
            }
        }

        // Kahn's algorithm, ready set ordered by NodeId
        let mut ready: BTreeSet<(NodeId, usize)> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(i, _)| (self.nodes[i].id, i))
            .collect();

        let mut result: Vec<&GraphNode> = Vec::with_capacity(n);

        while let Some((_, idx)) = ready.pop_first() {
            result.push(&self.nodes[idx]);

            for &ci in &consumers[idx] {
                in_degree[ci] -= 1;
                if in_degree[ci] == 0 {
                    ready.insert((self.nodes[ci].id, ci));
                }
            }
        }

        if result.len() != n {
            return Err(IrError::Cycle {
                visited: result.len(),
                total: n,
            });
        }

        Ok(result)
    }

    /// Find all nodes that consume the given edge.
    pub fn edge_consumers(&self, edge: EdgeId) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.inputs.contains(&edge))
            .collect()
    }

    /// Find the node that produces the given edge, if any.
    pub fn edge_producer(&self, edge: EdgeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.outputs.contains(&edge))
    }

    /// Parse a graph from JSON and resynchronize the id counters.
    pub fn from_json(text: &str) -> Result<Self, IrError> {
        let mut graph: Self = serde_json::from_str(text)?;
        let mut ids = graph.nodes.iter().map(|n| n.id.0).chain(graph.edges.keys().map(|e| e.0));
        if let Some(bad) = ids.find(|&id| id > MAX_ID) {
            return Err(IrError::IdOutOfRange(bad));
        }
        graph.next_node_id = graph.nodes.iter().map(|n| n.id.0 + 1).max().unwrap_or(0);
        graph.next_edge_id = graph.edges.keys().map(|e| e.0 + 1).max().unwrap_or(0);
        Ok(graph)
    }

    /// Serialize the graph to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
