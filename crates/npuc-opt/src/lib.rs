//! Operator downgrade rule engine.
//!
//! Backends advertise, per operator type, the newest opset version they
//! accept through [`OpsetSupport`]. [`DowngradeEngine`] walks a graph and
//! replaces every node that is too new with an equivalent subgraph built by
//! the matching [`DowngradeRule`] from a static [`RuleTable`].

mod engine;
mod error;
pub mod rules;

pub use engine::{DowngradeEngine, DowngradeRecord, DowngradeReport};
pub use error::{DowngradeError, RuleError};
pub use rules::{BUILTIN_RULES, DowngradeRule, DuplicateRule, Interpolate11To4, RuleKey, RuleTable};

use npuc_ir::{GraphNode, OperatorGraph};

/// Operator-version capability of a compiler backend.
pub trait OpsetSupport {
    /// Backend name, for diagnostics.
    fn backend_name(&self) -> &str;

    /// Newest version of `op_type` the backend accepts; `0` if it does not
    /// know the operator at all.
    fn max_supported_version(&self, op_type: &str) -> u32;
}

/// Highest version of `op_type` present in `graph`.
pub fn max_version_in(graph: &OperatorGraph, op_type: &str) -> Option<u32> {
    graph
        .nodes
        .iter()
        .filter(|n| n.op_type() == op_type)
        .map(|n| n.version)
        .max()
}

/// First node (in graph order) whose version exceeds what `support` accepts.
pub fn first_unsupported<'g>(
    graph: &'g OperatorGraph,
    support: &dyn OpsetSupport,
) -> Option<&'g GraphNode> {
    graph
        .nodes
        .iter()
        .find(|n| n.version > support.max_supported_version(n.op_type()))
}

/// Downgrade `graph` with the built-in rules.
pub fn downgrade(
    graph: &mut OperatorGraph,
    support: &dyn OpsetSupport,
) -> Result<DowngradeReport, DowngradeError> {
    DowngradeEngine::new(&RuleTable::builtin()).run(graph, support)
}

#[cfg(test)]
mod tests {
    use super::*;
    use npuc_ir::{OpKind, Scalar, TensorInfo, TensorShape};

    struct Everything;

    impl OpsetSupport for Everything {
        fn backend_name(&self) -> &str {
            "everything"
        }
        fn max_supported_version(&self, _op_type: &str) -> u32 {
            u32::MAX
        }
    }

    #[test]
    fn empty_graph_downgrades_trivially() {
        let mut graph = OperatorGraph::new();
        let report = downgrade(&mut graph, &Everything).unwrap();
        assert!(report.is_empty());
        assert_eq!(max_version_in(&graph, "Interpolate"), None);
    }

    #[test]
    fn first_unsupported_finds_new_node() {
        struct Old;
        impl OpsetSupport for Old {
            fn backend_name(&self) -> &str {
                "old"
            }
            fn max_supported_version(&self, _op_type: &str) -> u32 {
                1
            }
        }

        let mut graph = OperatorGraph::new();
        let x = graph.add_edge(TensorInfo::new("x", Scalar::F32, TensorShape::fixed(&[2])));
        let y = graph.add_edge(TensorInfo::new("y", Scalar::F32, TensorShape::fixed(&[2])));
        graph
            .add_node(OpKind::Relu, 7, vec![x], vec![y], "relu7")
            .unwrap();
        assert_eq!(first_unsupported(&graph, &Old).unwrap().name, "relu7");
        assert!(first_unsupported(&graph, &Everything).is_none());
        assert_eq!(max_version_in(&graph, "Relu"), Some(7));
    }
}
