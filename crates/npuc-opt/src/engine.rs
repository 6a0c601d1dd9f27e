//! Single-pass downgrade engine.

use std::collections::VecDeque;
use std::fmt;

use npuc_ir::{NodeId, OperatorGraph};

use crate::rules::RuleTable;
use crate::{DowngradeError, OpsetSupport, RuleError};

/// One node rewritten by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DowngradeRecord {
    /// Id of the removed node.
    pub node: NodeId,
    /// Name of the removed node (kept by the replacing node).
    pub name: String,
    pub op_type: String,
    pub from_version: u32,
    pub to_version: u32,
    /// Rule that performed the rewrite.
    pub rule: &'static str,
    /// Ids of the inserted nodes, in graph order.
    pub new_nodes: Vec<NodeId>,
}

impl fmt::Display for DowngradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}': {}-v{} -> v{} via {} ({} node(s))",
            self.name,
            self.op_type,
            self.from_version,
            self.to_version,
            self.rule,
            self.new_nodes.len()
        )
    }
}

/// Summary of a downgrade run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DowngradeReport {
    pub records: Vec<DowngradeRecord>,
}

impl DowngradeReport {
    /// `true` when the graph was already compatible.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Rewrites every node the backend cannot accept using a [`RuleTable`].
///
/// The engine keeps no state between runs; it can be shared freely as long
/// as each run gets its own graph.
#[derive(Clone, Copy, Debug)]
pub struct DowngradeEngine<'a> {
    rules: &'a RuleTable,
}

impl<'a> DowngradeEngine<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    /// Downgrade `graph` in place until every node fits `support`.
    ///
    /// Nodes are visited in deterministic topological order. Each
    /// unsupported node is rewritten by exactly one rule invocation; the
    /// nodes a rule inserts are checked before traversal resumes. On error
    /// the graph may be partially rewritten and must be discarded.
    pub fn run(
        &self,
        graph: &mut OperatorGraph,
        support: &dyn OpsetSupport,
    ) -> Result<DowngradeReport, DowngradeError> {
        graph.validate()?;

        let mut worklist: VecDeque<NodeId> =
            graph.topological_order()?.iter().map(|n| n.id).collect();
        let mut report = DowngradeReport::default();

        while let Some(id) = worklist.pop_front() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let ceiling = support.max_supported_version(node.op_type());
            if node.version <= ceiling {
                continue;
            }

            let Some(rule) = self.rules.lookup(node.op_type(), node.version) else {
                return Err(DowngradeError::NoDowngradeRule {
                    node: node.name.clone(),
                    op_type: node.op_type().to_string(),
                    version: node.version,
                    ceiling,
                });
            };

            let unsupported = |reason: String| DowngradeError::UnsupportedOperator {
                node: node.name.clone(),
                op_type: node.op_type().to_string(),
                version: node.version,
                ceiling,
                reason,
            };

            let replacement = rule.rewrite(graph, node, support).map_err(|e| match e {
                RuleError::NotApplicable(reason) => unsupported(reason),
                RuleError::Ir(e) => DowngradeError::Integrity(e),
            })?;

            if replacement
                .nodes
                .iter()
                .any(|n| n.op.type_name() == node.op_type() && n.version >= node.version)
            {
                return Err(unsupported(format!(
                    "rule '{}' did not lower the operator version",
                    rule.name()
                )));
            }

            let mut record = DowngradeRecord {
                node: id,
                name: node.name.clone(),
                op_type: node.op_type().to_string(),
                from_version: node.version,
                to_version: rule.target_version(),
                rule: rule.name(),
                new_nodes: Vec::new(),
            };

            record.new_nodes = graph.replace_node(id, replacement)?;
            log::debug!(
                "downgraded {record} for backend '{}'",
                support.backend_name()
            );

            for &new in record.new_nodes.iter().rev() {
                worklist.push_front(new);
            }
            report.records.push(record);
        }

        graph.validate()?;
        Ok(report)
    }
}
