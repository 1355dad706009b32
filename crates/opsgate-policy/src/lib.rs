//! # opsgate-policy
//!
//! A TOML-driven execution policy engine for the opsgate pipeline.
//!
//! ## Overview
//!
//! This crate provides [`TieredPolicyEngine`], which implements the
//! [`PolicyEngine`](opsgate_core::traits::PolicyEngine) trait. The baseline
//! policy follows the Decision's risk level and the tool's flags; ordered
//! override rules declared in TOML can then tighten it for particular tools,
//! environments, or permissions.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use opsgate_policy::TieredPolicyEngine;
//!
//! let engine = TieredPolicyEngine::from_file(Path::new("policies/ops.toml"))?;
//! // Pass `Arc::new(engine)` to `opsgate_core::Pipeline::new(...)`.
//! ```
//!
//! ## Rule matching
//!
//! Each rule names a `tool` and an `environment` pattern, both accepting the
//! wildcard `"*"`. Rules are applied in declaration order; the first match
//! wins. A rule can only escalate.

pub mod engine;
pub mod rule;

pub use engine::TieredPolicyEngine;
pub use rule::{PolicyConfig, PolicyRule};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;

    use opsgate_contracts::{
        capability::{Capability, CapabilitySet},
        decision::Decision,
        error::OpsgateError,
        ids::DecisionId,
        intent::{DecisionType, Entity, EntitySource, EntityType, Intent, IntentCategory, RiskLevel},
        tool::Tool,
        CONTRACT_VERSION,
    };
    use opsgate_core::traits::PolicyEngine;

    use crate::TieredPolicyEngine;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn decision(risk: RiskLevel, decision_type: DecisionType, entities: &[(EntityType, &str)]) -> Decision {
        Decision {
            schema_version: CONTRACT_VERSION,
            decision_id: DecisionId::new(),
            request_text: "request".to_string(),
            intent: Intent {
                category: IntentCategory::ServiceManagement,
                action: "status".to_string(),
                confidence: 0.9,
            },
            entities: entities
                .iter()
                .map(|(entity_type, value)| Entity {
                    entity_type: *entity_type,
                    value: value.to_string(),
                    confidence: 0.9,
                    source: EntitySource::Pattern,
                    span: None,
                })
                .collect(),
            risk_level: risk,
            decision_type,
            created_at: Utc::now(),
        }
    }

    fn tool(name: &str, production_safe: bool, high_impact: bool) -> Tool {
        Tool {
            name: name.to_string(),
            description: String::new(),
            capabilities: [Capability::ServiceControl].into_iter().collect::<CapabilitySet>(),
            required_permissions: BTreeSet::from(["service_admin".to_string()]),
            is_production_safe: production_safe,
            high_impact,
            actions: BTreeSet::new(),
            input_schema: BTreeMap::new(),
            outputs: BTreeSet::new(),
            exclusive_target: false,
            compensation: None,
            timeout_secs: None,
        }
    }

    fn engine(toml: &str) -> TieredPolicyEngine {
        TieredPolicyEngine::from_toml_str(toml).unwrap()
    }

    // ── 1. baseline ───────────────────────────────────────────────────────────

    /// High risk demands approval even for a production-safe tool.
    #[test]
    fn test_high_risk_requires_approval() {
        let policy = engine("")
            .derive_policy(&decision(RiskLevel::High, DecisionType::Action, &[]), &tool("service_status", true, false))
            .unwrap();
        assert!(policy.requires_approval);
        assert_eq!(policy.risk_tier, RiskLevel::High);
        assert!(!policy.parallelizable);
    }

    /// A tool that is not production safe needs approval at any risk.
    #[test]
    fn test_unsafe_tool_requires_approval() {
        let policy = engine("")
            .derive_policy(&decision(RiskLevel::Low, DecisionType::Action, &[]), &tool("service_stop", false, false))
            .unwrap();
        assert!(policy.requires_approval);
        assert_eq!(policy.risk_tier, RiskLevel::Low);
    }

    /// Read-only, low-risk work runs in parallel without approval.
    #[test]
    fn test_information_request_is_parallelizable() {
        let policy = engine("")
            .derive_policy(
                &decision(RiskLevel::Low, DecisionType::Information, &[(EntityType::CommandVerb, "show")]),
                &tool("service_status", true, false),
            )
            .unwrap();
        assert!(!policy.requires_approval);
        assert!(policy.parallelizable);
    }

    /// A mutating command verb anywhere in the request blocks parallelism.
    #[test]
    fn test_mutating_entity_blocks_parallelism() {
        let policy = engine("")
            .derive_policy(
                &decision(RiskLevel::Low, DecisionType::Information, &[(EntityType::CommandVerb, "restart")]),
                &tool("service_status", true, false),
            )
            .unwrap();
        assert!(!policy.parallelizable);
    }

    // ── 2. escalation ─────────────────────────────────────────────────────────

    /// High-impact tools raise the tier one level, never lower it.
    #[test]
    fn test_high_impact_escalates_tier() {
        let e = engine("");
        let medium = e
            .derive_policy(&decision(RiskLevel::Medium, DecisionType::Action, &[]), &tool("cluster_drain", true, true))
            .unwrap();
        assert_eq!(medium.risk_tier, RiskLevel::High);
        assert!(medium.requires_approval);

        let critical = e
            .derive_policy(&decision(RiskLevel::Critical, DecisionType::Action, &[]), &tool("cluster_drain", true, true))
            .unwrap();
        assert_eq!(critical.risk_tier, RiskLevel::Critical);
    }

    #[test]
    fn test_escalation_can_be_disabled() {
        let policy = engine("high_impact_escalation = false")
            .derive_policy(&decision(RiskLevel::Medium, DecisionType::Action, &[]), &tool("cluster_drain", true, true))
            .unwrap();
        assert_eq!(policy.risk_tier, RiskLevel::Medium);
    }

    // ── 3. rules ──────────────────────────────────────────────────────────────

    /// A production rule raises the tier and names its approver.
    #[test]
    fn test_environment_rule_escalates() {
        let toml = r#"
            [[rules]]
            id = "prod-floor"
            tool = "*"
            environment = "production"
            min_tier = "high"
            approver_role = "sre_on_call"
        "#;
        let e = engine(toml);

        let prod = e
            .derive_policy(
                &decision(RiskLevel::Low, DecisionType::Information, &[(EntityType::Environment, "Production")]),
                &tool("service_status", true, false),
            )
            .unwrap();
        assert_eq!(prod.risk_tier, RiskLevel::High);
        assert!(prod.requires_approval);
        assert_eq!(prod.approver_role.as_deref(), Some("sre_on_call"));

        let staging = e
            .derive_policy(
                &decision(RiskLevel::Low, DecisionType::Information, &[(EntityType::Environment, "staging")]),
                &tool("service_status", true, false),
            )
            .unwrap();
        assert_eq!(staging.risk_tier, RiskLevel::Low);
    }

    /// A rule's `min_tier` below the baseline cannot lower it.
    #[test]
    fn test_rules_never_deescalate() {
        let toml = r#"
            [[rules]]
            id = "relaxed"
            tool = "*"
            min_tier = "low"
        "#;
        let policy = engine(toml)
            .derive_policy(&decision(RiskLevel::High, DecisionType::Action, &[]), &tool("service_stop", false, false))
            .unwrap();
        assert_eq!(policy.risk_tier, RiskLevel::High);
        assert!(policy.requires_approval);
    }

    /// When two rules match, only the first applies.
    #[test]
    fn test_first_match_wins() {
        let toml = r#"
            [[rules]]
            id = "first"
            tool = "service_status"
            force_sequential = true

            [[rules]]
            id = "second"
            tool = "*"
            require_approval = true
        "#;
        let policy = engine(toml)
            .derive_policy(&decision(RiskLevel::Low, DecisionType::Information, &[]), &tool("service_status", true, false))
            .unwrap();
        assert!(!policy.parallelizable);
        assert!(!policy.requires_approval);
    }

    #[test]
    fn test_permission_scoped_rule() {
        let toml = r#"
            [[rules]]
            id = "db-admin"
            tool = "*"
            permission = "db_admin"
            require_approval = true
        "#;
        let policy = engine(toml)
            .derive_policy(&decision(RiskLevel::Low, DecisionType::Information, &[]), &tool("service_status", true, false))
            .unwrap();
        assert!(!policy.requires_approval, "tool lacks db_admin, rule must not match");
    }

    /// Without a rule role, the approver comes from the tier table.
    #[test]
    fn test_tier_approver_roles() {
        let toml = r#"
            [approver_roles]
            high = "sre_on_call"
            critical = "change_board"
        "#;
        let policy = engine(toml)
            .derive_policy(&decision(RiskLevel::Critical, DecisionType::Action, &[]), &tool("service_stop", false, false))
            .unwrap();
        assert_eq!(policy.approver_role.as_deref(), Some("change_board"));
    }

    // ── 4. configuration errors ───────────────────────────────────────────────

    #[test]
    fn test_toml_parse_error() {
        match TieredPolicyEngine::from_toml_str("this is not valid toml ][[[") {
            Err(OpsgateError::ConfigError { reason }) => {
                assert!(
                    reason.contains("failed to parse policy TOML"),
                    "expected parse error message, got: {reason}"
                );
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_threshold_above_high_is_rejected() {
        let result = TieredPolicyEngine::from_toml_str(r#"approval_threshold = "critical""#);
        assert!(matches!(result, Err(OpsgateError::ConfigError { .. })));
    }

    #[test]
    fn test_unknown_approver_tier_is_rejected() {
        let result = TieredPolicyEngine::from_toml_str("[approver_roles]\nsevere = \"someone\"");
        assert!(matches!(result, Err(OpsgateError::ConfigError { .. })));
    }
}
