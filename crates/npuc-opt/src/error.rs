//! Error types for the downgrade engine.

use npuc_ir::IrError;

/// Failure reported by an individual [`DowngradeRule`](crate::DowngradeRule).
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The rule exists for this operator version but cannot express this
    /// particular node (e.g. an attribute value with no older equivalent).
    #[error("not applicable: {0}")]
    NotApplicable(String),
    /// The node the rule was handed is malformed.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Errors that abort a downgrade run.
#[derive(Debug, thiserror::Error)]
pub enum DowngradeError {
    /// No rule is registered for the operator version.
    #[error(
        "no downgrade rule for '{node}' ({op_type}-v{version}); backend supports up to v{ceiling}"
    )]
    NoDowngradeRule {
        node: String,
        op_type: String,
        version: u32,
        ceiling: u32,
    },

    /// A rule exists but no downgrade path applies to this node.
    #[error("unsupported operator '{node}' ({op_type}-v{version}, ceiling v{ceiling}): {reason}")]
    UnsupportedOperator {
        node: String,
        op_type: String,
        version: u32,
        ceiling: u32,
        reason: String,
    },

    /// The graph is malformed before or after rewriting.
    #[error("graph integrity: {0}")]
    Integrity(#[from] IrError),
}
