//! Tiered policy engine implementation.
//!
//! `TieredPolicyEngine` loads a `PolicyConfig` from a TOML string or file and
//! implements the `PolicyEngine` trait from opsgate-core.
//!
//! Derivation algorithm:
//!
//! 1. `risk_tier` starts at the Decision's risk level, one level higher for a
//!    `high_impact` tool when escalation is enabled.
//! 2. `requires_approval` if the tier reaches `approval_threshold` or the
//!    tool is not production safe.
//! 3. `parallelizable` only for information requests with no command verb
//!    entity that mutates state.
//! 4. The first matching rule may raise the tier, demand approval, name an
//!    approver, or forbid parallelism. It can never relax anything.

use std::path::Path;

use tracing::debug;

use opsgate_contracts::{
    decision::Decision,
    error::{OpsgateError, OpsgateResult},
    intent::{DecisionType, EntityType, RiskLevel},
    selection::ExecutionPolicy,
    tool::Tool,
};
use opsgate_core::{lexicon, traits::PolicyEngine};

use crate::rule::PolicyConfig;

/// A `PolicyEngine` that reads its baseline and override rules from TOML.
///
/// ```rust,ignore
/// use opsgate_policy::TieredPolicyEngine;
///
/// let engine = TieredPolicyEngine::from_file(Path::new("policies/ops.toml"))?;
/// ```
#[derive(Debug, Default)]
pub struct TieredPolicyEngine {
    config: PolicyConfig,
}

impl TieredPolicyEngine {
    /// Parse `s` as TOML and build a `TieredPolicyEngine`.
    ///
    /// Returns `OpsgateError::ConfigError` if the TOML is malformed, an
    /// approver role names an unknown tier, or the threshold is above high.
    pub fn from_toml_str(s: &str) -> OpsgateResult<Self> {
        let config: PolicyConfig = toml::from_str(s).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as TOML policy configuration.
    pub fn from_file(path: &Path) -> OpsgateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: PolicyConfig) -> OpsgateResult<Self> {
        if config.approval_threshold > RiskLevel::High {
            return Err(OpsgateError::ConfigError {
                reason: format!(
                    "approval_threshold '{}' is above 'high'; high-risk work must always need approval",
                    config.approval_threshold
                ),
            });
        }
        for tier in config.approver_roles.keys() {
            if !matches!(tier.as_str(), "low" | "medium" | "high" | "critical") {
                return Err(OpsgateError::ConfigError {
                    reason: format!("approver_roles names unknown risk tier '{tier}'"),
                });
            }
        }
        Ok(Self { config })
    }
}

impl PolicyEngine for TieredPolicyEngine {
    fn derive_policy(&self, decision: &Decision, tool: &Tool) -> OpsgateResult<ExecutionPolicy> {
        let mut risk_tier = decision.risk_level;
        if tool.high_impact && self.config.high_impact_escalation {
            risk_tier = risk_tier.escalate();
        }

        let mut requires_approval =
            risk_tier >= self.config.approval_threshold || !tool.is_production_safe;

        let mutating_entity = decision
            .entities_of(EntityType::CommandVerb)
            .any(|e| lexicon::is_mutating(&e.normalized_value()));
        let mut parallelizable =
            decision.decision_type == DecisionType::Information && !mutating_entity;

        let mut approver_role = None;

        let environments: Vec<String> = decision
            .entities_of(EntityType::Environment)
            .map(|e| e.normalized_value())
            .collect();
        let permissions: Vec<&str> = tool.required_permissions.iter().map(String::as_str).collect();

        if let Some(rule) = self
            .config
            .rules
            .iter()
            .find(|r| r.matches(&tool.name, &permissions, &environments))
        {
            debug!(
                rule_id = %rule.id,
                tool = %tool.name,
                decision_id = %decision.decision_id,
                "policy rule matched"
            );
            if let Some(min) = rule.min_tier {
                risk_tier = risk_tier.max(min);
                requires_approval |= risk_tier >= self.config.approval_threshold;
            }
            requires_approval |= rule.require_approval;
            parallelizable &= !rule.force_sequential;
            approver_role = rule.approver_role.clone();
        }

        if requires_approval && approver_role.is_none() {
            approver_role = self.config.approver_roles.get(risk_tier.as_str()).cloned();
        }

        let policy = ExecutionPolicy { requires_approval, parallelizable, risk_tier, approver_role };
        debug!(
            decision_id = %decision.decision_id,
            tool = %tool.name,
            risk_tier = %policy.risk_tier,
            requires_approval = policy.requires_approval,
            parallelizable = policy.parallelizable,
            "execution policy derived"
        );
        Ok(policy)
    }
}
