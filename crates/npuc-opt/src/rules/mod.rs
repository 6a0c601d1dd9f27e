//! Downgrade rules and the static rule table.

mod interpolate;

use std::fmt::{self, Debug};

use npuc_ir::{GraphNode, OperatorGraph, Replacement};

use crate::{OpsetSupport, RuleError};

pub use interpolate::Interpolate11To4;

/// Key identifying the operator version a rule rewrites.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RuleKey {
    /// OpenVINO operator type (e.g. "Interpolate").
    pub op_type: &'static str,
    /// Opset version the rule accepts.
    pub version: u32,
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.op_type, self.version)
    }
}

/// A rewrite from one operator version to an equivalent older subgraph.
///
/// Rules are stateless: [`rewrite`](Self::rewrite) inspects the graph and
/// returns a [`Replacement`] without mutating anything.
pub trait DowngradeRule: Debug + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// The operator version this rule rewrites.
    fn source(&self) -> RuleKey;

    /// Version of the operator after rewriting.
    fn target_version(&self) -> u32;

    /// Build the replacement subgraph for `node`.
    ///
    /// `support` is the capability of the target backend; helper operators
    /// the rule inserts must pick versions it accepts.
    fn rewrite(
        &self,
        graph: &OperatorGraph,
        node: &GraphNode,
        support: &dyn OpsetSupport,
    ) -> Result<Replacement, RuleError>;
}

/// Every built-in rule, keyed by [`DowngradeRule::source`].
pub static BUILTIN_RULES: &[&dyn DowngradeRule] = &[&Interpolate11To4];

/// Two rules registered for the same operator version.
#[derive(Debug, thiserror::Error)]
#[error("rules '{first}' and '{second}' both rewrite {key}")]
pub struct DuplicateRule {
    pub key: RuleKey,
    pub first: &'static str,
    pub second: &'static str,
}

/// Lookup table from `(op_type, version)` to a rule.
#[derive(Clone, Debug)]
pub struct RuleTable {
    rules: &'static [&'static dyn DowngradeRule],
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleTable {
    /// The table of built-in rules.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES,
        }
    }

    /// A table with no rules.
    pub fn empty() -> Self {
        Self { rules: &[] }
    }

    /// Build a table from an explicit rule list, rejecting duplicate keys.
    pub fn from_rules(rules: &'static [&'static dyn DowngradeRule]) -> Result<Self, DuplicateRule> {
        for (i, a) in rules.iter().enumerate() {
            if let Some(b) = rules[..i].iter().find(|b| b.source() == a.source()) {
                return Err(DuplicateRule {
                    key: a.source(),
                    first: b.name(),
                    second: a.name(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Find the rule registered for exactly `(op_type, version)`.
    pub fn lookup(&self, op_type: &str, version: u32) -> Option<&'static dyn DowngradeRule> {
        self.rules
            .iter()
            .copied()
            .find(|r| r.source().op_type == op_type && r.source().version == version)
    }

    /// Keys of all registered rules.
    pub fn keys(&self) -> Vec<RuleKey> {
        self.rules.iter().map(|r| r.source()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_keys_are_unique() {
        assert!(RuleTable::from_rules(BUILTIN_RULES).is_ok());
    }

    #[test]
    fn lookup_is_exact() {
        let table = RuleTable::builtin();
        assert_eq!(
            table.lookup("Interpolate", 11).unwrap().name(),
            "interpolate11-to-interpolate4"
        );
        assert!(table.lookup("Interpolate", 4).is_none());
        assert!(table.lookup("Interpolate", 12).is_none());
        assert!(table.lookup("TopK", 11).is_none());
    }

    #[test]
    fn duplicate_keys_rejected() {
        static TWICE: &[&dyn DowngradeRule] = &[&Interpolate11To4, &Interpolate11To4];
        let err = RuleTable::from_rules(TWICE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "rules 'interpolate11-to-interpolate4' and 'interpolate11-to-interpolate4' both rewrite Interpolate-v11"
        );
    }

    #[test]
    fn empty_table() {
        let table = RuleTable::empty();
        assert!(table.is_empty());
        assert!(table.lookup("Interpolate", 11).is_none());
        assert_eq!(RuleTable::default().len(), 1);
        assert_eq!(
            RuleTable::builtin().keys(),
            vec![RuleKey {
                op_type: "Interpolate",
                version: 11
            }]
        );
    }
}
