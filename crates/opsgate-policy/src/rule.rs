//! Policy rule types and configuration schema.
//!
//! A `PolicyConfig` is deserialized from TOML. Besides the baseline
//! settings it holds an ordered list of `PolicyRule`s; the first rule
//! matching a tool applies. Rules can only make a policy stricter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use opsgate_contracts::intent::RiskLevel;

/// An override rule loaded from TOML.
///
/// `tool` and `environment` support the wildcard `"*"`. `permission`, when
/// set, restricts the rule to tools that require that permission.
///
/// ```toml
/// [[rules]]
/// id = "db-changes"
/// description = "Database tools need a DBA on production"
/// tool = "*"
/// environment = "production"
/// permission = "db_admin"
/// min_tier = "high"
/// require_approval = true
/// approver_role = "dba_on_call"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable identifier used in logs.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Tool name pattern. `"*"` matches any tool.
    pub tool: String,

    /// Environment pattern matched against the Decision's environment
    /// entities. `"*"` (the default) matches any request.
    #[serde(default = "wildcard")]
    pub environment: String,

    #[serde(default)]
    pub permission: Option<String>,

    /// Raise the risk tier to at least this level.
    #[serde(default)]
    pub min_tier: Option<RiskLevel>,

    #[serde(default)]
    pub require_approval: bool,

    /// Overrides the tier-based approver role.
    #[serde(default)]
    pub approver_role: Option<String>,

    /// Forbid parallel execution of the selected tools.
    #[serde(default)]
    pub force_sequential: bool,
}

fn wildcard() -> String {
    "*".to_string()
}

impl PolicyRule {
    /// True if the rule applies to `tool` for a request naming
    /// `environments`.
    ///
    /// - `"*"` in `tool` matches any tool name.
    /// - `"*"` in `environment` matches any request, including one that
    ///   names no environment.
    /// - Otherwise matching is exact.
    pub fn matches(&self, tool: &str, permissions: &[&str], environments: &[String]) -> bool {
        let tool_matches = self.tool == "*" || self.tool == tool;
        let env_matches = self.environment == "*" || environments.iter().any(|e| *e == self.environment);
        let permission_matches = self
            .permission
            .as_deref()
            .map_or(true, |p| permissions.contains(&p));
        tool_matches && env_matches && permission_matches
    }
}

/// The top-level structure deserialized from a TOML policy file.
///
/// ```toml
/// approval_threshold = "high"
/// high_impact_escalation = true
///
/// [approver_roles]
/// high = "sre_on_call"
/// critical = "change_board"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Risk tier at or above which approval is required. May be lowered to
    /// demand approval more often, never raised above `high`.
    #[serde(default = "default_threshold")]
    pub approval_threshold: RiskLevel,

    /// Raise the tier one level for tools flagged `high_impact`.
    #[serde(default = "default_true")]
    pub high_impact_escalation: bool,

    /// Approver role per risk tier name ("medium", "high", "critical").
    #[serde(default)]
    pub approver_roles: BTreeMap<String, String>,

    /// Ordered override rules. First match wins.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

fn default_threshold() -> RiskLevel {
    RiskLevel::High
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            approval_threshold: default_threshold(),
            high_impact_escalation: true,
            approver_roles: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}
