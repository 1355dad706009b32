//! Capability matcher: ranks registry tools for a Decision.
//!
//! Candidates come from the category → capability table, filtered by the
//! action verb a tool declares. Each candidate is scored on capability
//! overlap, entity compatibility, and production posture. Ranking is a
//! stable sort, so equal scores keep registry order.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use opsgate_contracts::{
    decision::Decision,
    intent::{EntityType, RiskLevel},
    tool::Tool,
};
use opsgate_registry::ToolRegistry;

use crate::scoring;

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMatch {
    pub tool: String,
    /// Registration index. The tie-break of last resort.
    pub position: usize,
    pub capability_overlap: f64,
    pub entity_compatibility: f64,
    /// False when a non-production-safe tool faces a medium-or-higher risk.
    pub posture_match: bool,
    pub score: f64,
}

pub struct CapabilityMatcher {
    registry: Arc<ToolRegistry>,
}

impl CapabilityMatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Rank the tools able to serve `action` for this Decision's category.
    ///
    /// `action` is usually the Decision's own verb; composite expansion
    /// passes each sub-action in turn. An empty result means no tool
    /// qualifies.
    pub fn rank(&self, decision: &Decision, action: &str) -> Vec<ToolMatch> {
        let required = decision.intent.category.required_capabilities();

        let mut matches: Vec<ToolMatch> = self
            .registry
            .find_by_intent(decision.intent.category)
            .into_iter()
            .filter(|tool| tool.serves_action(action))
            .filter_map(|tool| {
                let position = self.registry.position(&tool.name)?;
                Some(score_tool(tool, position, decision, required))
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            decision_id = %decision.decision_id,
            category = %decision.intent.category,
            action,
            candidates = matches.len(),
            top = matches.first().map(|m| m.tool.as_str()).unwrap_or("-"),
            "ranked candidate tools"
        );
        matches
    }
}

fn score_tool(
    tool: &Tool,
    position: usize,
    decision: &Decision,
    required: &[opsgate_contracts::capability::Capability],
) -> ToolMatch {
    let capability_overlap = if tool.capabilities.is_empty() {
        0.0
    } else {
        tool.capabilities.overlap(required) as f64 / tool.capabilities.len() as f64
    };
    let entity_compatibility = entity_compatibility(tool, decision);
    let posture_match = tool.is_production_safe || decision.risk_level < RiskLevel::Medium;

    ToolMatch {
        tool: tool.name.clone(),
        position,
        capability_overlap,
        entity_compatibility,
        posture_match,
        score: scoring::match_score(capability_overlap, entity_compatibility, posture_match),
    }
}

/// Contextual kinds describe the request rather than name an input, so they
/// only count when the tool takes them.
fn is_contextual(kind: EntityType) -> bool {
    matches!(kind, EntityType::Environment | EntityType::CommandVerb)
}

/// Fraction of the Decision's relevant entities the tool has an input for.
fn entity_compatibility(tool: &Tool, decision: &Decision) -> f64 {
    let relevant: Vec<EntityType> = decision
        .entities
        .iter()
        .map(|e| e.entity_type)
        .filter(|kind| !is_contextual(*kind) || tool.accepts(*kind))
        .collect();
    if relevant.is_empty() {
        return 1.0;
    }
    let accepted = relevant.iter().filter(|kind| tool.accepts(**kind)).count();
    accepted as f64 / relevant.len() as f64
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use opsgate_contracts::{
        ids::DecisionId,
        intent::{DecisionType, Entity, EntitySource, Intent, IntentCategory},
        CONTRACT_VERSION,
    };

    use super::*;

    const CATALOG: &str = r#"
        [[tools]]
        name = "metrics_query"
        capabilities = ["metrics"]
        is_production_safe = true
        [tools.input_schema.host]
        type = "hostname"

        [[tools]]
        name = "asset_inventory"
        capabilities = ["asset_query"]
        is_production_safe = true

        [[tools]]
        name = "cmdb_sync"
        capabilities = ["asset_query", "file_write"]

        [[tools]]
        name = "service_stop"
        capabilities = ["service_control"]
        actions = ["stop"]
        [tools.input_schema.host]
        required = true
        type = "hostname"
        [tools.input_schema.service]
        required = true
        type = "service"

        [[tools]]
        name = "service_status"
        capabilities = ["service_status"]
        is_production_safe = true
        actions = ["status", "check"]
        [tools.input_schema.host]
        type = "hostname"
    "#;

    fn matcher() -> CapabilityMatcher {
        CapabilityMatcher::new(Arc::new(ToolRegistry::from_toml_str(CATALOG).unwrap()))
    }

    fn decision(category: IntentCategory, action: &str, risk: RiskLevel, entities: Vec<(EntityType, &str)>) -> Decision {
        Decision {
            schema_version: CONTRACT_VERSION,
            decision_id: DecisionId::new(),
            request_text: "request".to_string(),
            intent: Intent { category, action: action.to_string(), confidence: 0.9 },
            entities: entities
                .into_iter()
                .map(|(entity_type, value)| Entity {
                    entity_type,
                    value: value.to_string(),
                    confidence: 0.9,
                    source: EntitySource::Pattern,
                    span: None,
                })
                .collect(),
            risk_level: risk,
            decision_type: DecisionType::Action,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn asset_request_never_matches_metrics_tool() {
        let d = decision(IntentCategory::AssetManagement, "list", RiskLevel::Low, vec![]);
        let ranked = matcher().rank(&d, "list");
        let names: Vec<&str> = ranked.iter().map(|m| m.tool.as_str()).collect();
        assert_eq!(names, vec!["asset_inventory", "cmdb_sync"]);
        assert_eq!(ranked[0].score, 1.0);
        assert!(ranked[1].score < ranked[0].score);
    }

    #[test]
    fn action_verb_filters_candidates() {
        let d = decision(
            IntentCategory::ServiceManagement,
            "stop",
            RiskLevel::High,
            vec![(EntityType::Hostname, "prod-db-01"), (EntityType::Service, "database")],
        );
        let ranked = matcher().rank(&d, "stop");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].tool, "service_stop");
        assert_eq!(ranked[0].entity_compatibility, 1.0);
        assert!(!ranked[0].posture_match);
    }

    #[test]
    fn unsafe_tool_scores_lower_under_risk() {
        let low = decision(IntentCategory::ServiceManagement, "stop", RiskLevel::Low, vec![]);
        let high = decision(IntentCategory::ServiceManagement, "stop", RiskLevel::High, vec![]);
        let m = matcher();
        assert!(m.rank(&high, "stop")[0].score < m.rank(&low, "stop")[0].score);
    }

    #[test]
    fn contextual_entities_do_not_penalise() {
        let d = decision(
            IntentCategory::ServiceManagement,
            "status",
            RiskLevel::Low,
            vec![(EntityType::Hostname, "web-01"), (EntityType::CommandVerb, "status")],
        );
        let ranked = matcher().rank(&d, "status");
        assert_eq!(ranked[0].tool, "service_status");
        assert_eq!(ranked[0].entity_compatibility, 1.0);
    }

    #[test]
    fn no_capable_tool_yields_empty_ranking() {
        let d = decision(IntentCategory::NetworkDiagnostics, "ping", RiskLevel::Low, vec![]);
        assert!(matcher().rank(&d, "ping").is_empty());
    }
}
