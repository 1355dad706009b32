//! Stage B: Decision → Selection.
//!
//! A top match that clears the threshold with no near-tie is taken as is.
//! Otherwise the backend picks among the contenders, and a backend failure
//! fails the selection. There is no heuristic fallback.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use opsgate_contracts::{
    backend::{BackendRequest, BackendTask, ResponseRule, ResponseRuleType, ResponseSchema},
    decision::Decision,
    error::{OpsgateError, OpsgateResult},
    ids::SelectionId,
    selection::{ExecutionPolicy, Selection},
    tool::Tool,
    CONTRACT_VERSION,
};
use opsgate_registry::ToolRegistry;

use crate::{
    config::PipelineConfig,
    gateway::BackendGateway,
    matcher::{CapabilityMatcher, ToolMatch},
    scoring::{self, BackendAgreement},
    traits::PolicyEngine,
};

pub const SELECT_SCHEMA_ID: &str = "opsgate.select_tool.v1";

#[derive(Debug, Deserialize)]
struct SelectResponse {
    tool: String,
    confidence: f64,
    #[serde(default)]
    justification: String,
}

/// The tool chosen for one action, and how it was chosen.
#[derive(Debug, Clone)]
struct Pick {
    action: String,
    chosen: ToolMatch,
    agreement: BackendAgreement,
    backend_justification: Option<String>,
}

pub struct Selector {
    matcher: CapabilityMatcher,
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn PolicyEngine>,
    gateway: Arc<BackendGateway>,
    threshold: f64,
    tie_epsilon: f64,
    tie_break_candidates: usize,
}

impl Selector {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<dyn PolicyEngine>,
        gateway: Arc<BackendGateway>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            matcher: CapabilityMatcher::new(registry.clone()),
            registry,
            policy,
            gateway,
            threshold: config.selection_threshold,
            tie_epsilon: config.tie_epsilon,
            tie_break_candidates: config.tie_break_candidates,
        }
    }

    pub fn matcher(&self) -> &CapabilityMatcher {
        &self.matcher
    }

    /// Select tools for a Decision, consuming it.
    ///
    /// Fails with `NoCandidateTool` when nothing can serve the request and
    /// `BackendUnavailable` when a needed tie-break cannot be obtained. An
    /// ambiguous Decision still yields a Selection, with lowered confidence.
    pub async fn select(&self, decision: Decision) -> OpsgateResult<Selection> {
        decision.validate()?;

        let mut picks: Vec<Pick> = Vec::new();
        for (action, ranked) in self.candidates(&decision)? {
            let pick = self.pick(&decision, &action, &ranked).await?;
            if picks.iter().any(|p| p.chosen.tool == pick.chosen.tool) {
                continue;
            }
            picks.push(pick);
        }

        let tools: Vec<&Tool> = picks
            .iter()
            .map(|p| {
                self.registry.get(&p.chosen.tool).ok_or_else(|| OpsgateError::Validation {
                    reason: format!("tool '{}' vanished from the registry", p.chosen.tool),
                })
            })
            .collect::<OpsgateResult<_>>()?;

        let mut policy: Option<ExecutionPolicy> = None;
        for tool in &tools {
            let derived = self.policy.derive_policy(&decision, tool)?;
            policy = Some(match policy {
                Some(p) => p.merge(derived),
                None => derived,
            });
        }
        let execution_policy = policy.ok_or_else(|| OpsgateError::Validation {
            reason: "selection produced no tools".to_string(),
        })?;

        let bound_inputs = bind_inputs(&decision, &tools);
        let additional_inputs_needed = missing_inputs(&tools, &bound_inputs);
        let targets = targets(&decision);

        let selection_confidence = picks
            .iter()
            .map(|p| {
                scoring::selection_confidence(
                    p.chosen.score,
                    p.agreement,
                    decision.intent.confidence,
                    decision.is_ambiguous(),
                )
            })
            .fold(1.0_f64, f64::min);

        let selection = Selection {
            schema_version: CONTRACT_VERSION,
            selection_id: SelectionId::new(),
            decision_id: decision.decision_id,
            decision_type: decision.decision_type,
            selected_tools: picks.iter().map(|p| p.chosen.tool.clone()).collect(),
            execution_policy,
            additional_inputs_needed,
            bound_inputs,
            targets,
            justification: justify(&decision, &picks),
            selection_confidence,
            created_at: Utc::now(),
        };
        selection.validate()?;

        info!(
            decision_id = %selection.decision_id,
            selection_id = %selection.selection_id,
            tools = ?selection.selected_tools,
            confidence = selection.selection_confidence,
            requires_approval = selection.execution_policy.requires_approval,
            risk_tier = %selection.execution_policy.risk_tier,
            "tools selected"
        );
        Ok(selection)
    }

    /// Ranked candidates per action. A verb no tool serves directly is
    /// expanded through the registry's composites.
    fn candidates(&self, decision: &Decision) -> OpsgateResult<Vec<(String, Vec<ToolMatch>)>> {
        let action = decision.intent.action.as_str();
        let ranked = self.matcher.rank(decision, action);
        if !ranked.is_empty() {
            return Ok(vec![(action.to_string(), ranked)]);
        }

        let no_candidate = |action: &str| OpsgateError::NoCandidateTool {
            category: decision.intent.category.to_string(),
            action: action.to_string(),
        };

        let Some(sequence) = self.registry.composite(action) else {
            return Err(no_candidate(action));
        };
        debug!(decision_id = %decision.decision_id, action, ?sequence, "expanding composite action");

        sequence
            .iter()
            .map(|sub| {
                let ranked = self.matcher.rank(decision, sub);
                if ranked.is_empty() {
                    Err(no_candidate(sub))
                } else {
                    Ok((sub.clone(), ranked))
                }
            })
            .collect()
    }

    async fn pick(&self, decision: &Decision, action: &str, ranked: &[ToolMatch]) -> OpsgateResult<Pick> {
        let Some(top) = ranked.first() else {
            return Err(OpsgateError::NoCandidateTool {
                category: decision.intent.category.to_string(),
                action: action.to_string(),
            });
        };
        // `ranked` keeps registry order among equal scores, so an exact tie
        // is already settled in favour of `top`. Only the remaining scores
        // are open to the backend.
        let distinct: Vec<&ToolMatch> = ranked
            .iter()
            .enumerate()
            .filter(|(i, m)| *i == 0 || m.score != top.score)
            .map(|(_, m)| m)
            .collect();
        let near_tie: Vec<&ToolMatch> = distinct
            .iter()
            .copied()
            .take_while(|m| top.score - m.score < self.tie_epsilon)
            .collect();

        if top.score >= self.threshold && near_tie.len() == 1 {
            return Ok(Pick {
                action: action.to_string(),
                chosen: top.clone(),
                agreement: BackendAgreement::NotConsulted,
                backend_justification: None,
            });
        }

        let contenders: Vec<&ToolMatch> = if near_tie.len() > 1 {
            near_tie
        } else {
            distinct.into_iter().take(self.tie_break_candidates).collect()
        };
        debug!(
            decision_id = %decision.decision_id,
            action,
            top = %top.tool,
            score = top.score,
            contenders = contenders.len(),
            "consulting backend for tool choice"
        );

        let request = BackendRequest {
            task: BackendTask::SelectTool,
            input: decision.request_text.clone(),
            context: self.select_context(decision, action, &contenders),
            schema: select_schema(&contenders),
        };
        let response: SelectResponse = self.gateway.call_as(&request).await?;

        let chosen = contenders
            .iter()
            .find(|m| m.tool == response.tool)
            .copied()
            .ok_or_else(|| OpsgateError::BackendUnavailable {
                reason: format!(
                    "malformed select_tool response (schema '{SELECT_SCHEMA_ID}'): '{}' is not a candidate",
                    response.tool
                ),
            })?;

        let agreement = if chosen.tool == top.tool {
            BackendAgreement::Agreed { backend_confidence: response.confidence }
        } else {
            BackendAgreement::Overrode { backend_confidence: response.confidence }
        };

        Ok(Pick {
            action: action.to_string(),
            chosen: chosen.clone(),
            agreement,
            backend_justification: Some(response.justification),
        })
    }

    fn select_context(&self, decision: &Decision, action: &str, contenders: &[&ToolMatch]) -> Value {
        let candidates: Vec<Value> = contenders
            .iter()
            .map(|m| {
                let description = self.registry.get(&m.tool).map(|t| t.description.as_str()).unwrap_or("");
                json!({ "tool": m.tool, "description": description, "score": m.score })
            })
            .collect();
        let entities: Vec<Value> = decision
            .entities
            .iter()
            .map(|e| json!({ "type": e.entity_type.as_str(), "value": e.value }))
            .collect();
        json!({
            "category": decision.intent.category.as_str(),
            "action": action,
            "risk_level": decision.risk_level.as_str(),
            "entities": entities,
            "candidates": candidates,
        })
    }
}

/// The response contract for a tie-break among `contenders`.
fn select_schema(contenders: &[&ToolMatch]) -> ResponseSchema {
    ResponseSchema {
        schema_id: SELECT_SCHEMA_ID.to_string(),
        json_schema: json!({
            "type": "object",
            "required": ["tool", "confidence"],
            "properties": {
                "tool": { "type": "string" },
                "confidence": { "type": "number" },
                "justification": { "type": "string" }
            }
        }),
        rules: vec![
            ResponseRule {
                rule_id: "select-tool-candidate".to_string(),
                description: "tool must be one of the offered candidates".to_string(),
                rule_type: ResponseRuleType::AllowedValues {
                    field_path: "tool".to_string(),
                    allowed: contenders.iter().map(|m| json!(m.tool)).collect(),
                },
            },
            ResponseRule {
                rule_id: "select-confidence-range".to_string(),
                description: "confidence must lie in [0, 1]".to_string(),
                rule_type: ResponseRuleType::NumberRange {
                    field_path: "confidence".to_string(),
                    min: 0.0,
                    max: 1.0,
                },
            },
        ],
    }
}

/// Entity values for each tool parameter whose type they match. Several
/// values for one parameter bind as an array.
fn bind_inputs(decision: &Decision, tools: &[&Tool]) -> BTreeMap<String, BTreeMap<String, Value>> {
    tools
        .iter()
        .map(|tool| {
            let params = tool
                .input_schema
                .iter()
                .filter_map(|(name, spec)| {
                    let mut values: Vec<String> = Vec::new();
                    for entity in decision.entities_of(spec.kind) {
                        if !values.contains(&entity.value) {
                            values.push(entity.value.clone());
                        }
                    }
                    match values.len() {
                        0 => None,
                        1 => Some((name.clone(), Value::String(values.remove(0)))),
                        _ => Some((name.clone(), json!(values))),
                    }
                })
                .collect();
            (tool.name.clone(), params)
        })
        .collect()
}

/// Required parameters that neither an entity nor an earlier tool's output
/// can fill.
fn missing_inputs(
    tools: &[&Tool],
    bound: &BTreeMap<String, BTreeMap<String, Value>>,
) -> BTreeSet<String> {
    let mut produced: BTreeSet<&str> = BTreeSet::new();
    let mut missing = BTreeSet::new();
    for tool in tools {
        let bound_here = bound.get(&tool.name);
        for (param, _) in tool.required_params() {
            let is_bound = bound_here.map_or(false, |b| b.contains_key(param));
            if !is_bound && !produced.contains(param) {
                missing.insert(param.to_string());
            }
        }
        produced.extend(tool.outputs.iter().map(String::as_str));
    }
    missing
}

fn targets(decision: &Decision) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for entity in decision.entities.iter().filter(|e| e.entity_type.is_target()) {
        if !targets.contains(&entity.value) {
            targets.push(entity.value.clone());
        }
    }
    targets
}

fn justify(decision: &Decision, picks: &[Pick]) -> String {
    let mut parts: Vec<String> = picks
        .iter()
        .map(|p| {
            let mut line = format!(
                "'{}' serves '{}' for {} (capability overlap {:.2}, entity fit {:.2}, score {:.2})",
                p.chosen.tool,
                p.action,
                decision.intent.category,
                p.chosen.capability_overlap,
                p.chosen.entity_compatibility,
                p.chosen.score
            );
            if let Some(reason) = p.backend_justification.as_deref().filter(|r| !r.is_empty()) {
                line.push_str(&format!("; backend: {reason}"));
            }
            line
        })
        .collect();
    if decision.is_ambiguous() {
        parts.push(format!(
            "request is ambiguous (confidence {:.2}); ask the requester to clarify before execution",
            decision.intent.confidence
        ));
    }
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use opsgate_contracts::{
        backend::VerificationReport,
        ids::DecisionId,
        intent::{DecisionType, Entity, EntitySource, EntityType, Intent, IntentCategory, RiskLevel},
    };

    use super::*;
    use crate::traits::{ReasoningBackend, ResponseVerifier};

    // ── Mocks ─────────────────────────────────────────────────────────────

    struct FixedPick {
        response: Option<Value>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningBackend for FixedPick {
        async fn invoke(&self, _request: &BackendRequest) -> OpsgateResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| OpsgateError::BackendUnavailable { reason: "unreachable".to_string() })
        }

        fn name(&self) -> &str {
            "fixed-pick"
        }
    }

    struct PassVerifier;

    impl ResponseVerifier for PassVerifier {
        fn verify(&self, _response: &Value, _schema: &ResponseSchema) -> OpsgateResult<VerificationReport> {
            Ok(VerificationReport::pass())
        }
    }

    /// Approval for unsafe tools, tier mirrors risk.
    struct SimplePolicy;

    impl PolicyEngine for SimplePolicy {
        fn derive_policy(&self, decision: &Decision, tool: &Tool) -> OpsgateResult<ExecutionPolicy> {
            Ok(ExecutionPolicy {
                requires_approval: !tool.is_production_safe || decision.risk_level >= RiskLevel::High,
                parallelizable: decision.decision_type == DecisionType::Information,
                risk_tier: decision.risk_level,
                approver_role: None,
            })
        }
    }

    const CATALOG: &str = r#"
        [[tools]]
        name = "metrics_query"
        capabilities = ["metrics"]
        is_production_safe = true

        [[tools]]
        name = "asset_inventory"
        capabilities = ["asset_query"]
        is_production_safe = true
        outputs = ["hosts"]

        [[tools]]
        name = "asset_export"
        capabilities = ["asset_query"]
        is_production_safe = true

        [[tools]]
        name = "asset_snapshot"
        capabilities = ["asset_query"]

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
        name = "service_start"
        capabilities = ["service_control"]
        actions = ["start"]
        [tools.input_schema.host]
        required = true
        type = "hostname"
        [tools.input_schema.service]
        required = true
        type = "service"

        [[ordering]]
        before = "service_stop"
        after = "service_start"

        [[composites]]
        action = "restart"
        sequence = ["stop", "start"]
    "#;

    fn selector(response: Option<Value>) -> (Selector, Arc<FixedPick>) {
        selector_with(CATALOG, &PipelineConfig::default(), response)
    }

    fn selector_with(catalog: &str, config: &PipelineConfig, response: Option<Value>) -> (Selector, Arc<FixedPick>) {
        let backend = Arc::new(FixedPick { response, calls: AtomicUsize::new(0) });
        let gateway = Arc::new(BackendGateway::new(
            backend.clone(),
            Arc::new(PassVerifier),
            Duration::from_millis(100),
        ));
        let registry = Arc::new(ToolRegistry::from_toml_str(catalog).unwrap());
        let selector = Selector::new(registry, Arc::new(SimplePolicy), gateway, config);
        (selector, backend)
    }

    /// asset_snapshot is not production safe, so at medium risk it scores
    /// 1/1.1 against 1.0 for the safe asset tools.
    fn near_tie_selector(response: Option<Value>) -> (Selector, Arc<FixedPick>) {
        let config = PipelineConfig { tie_epsilon: 0.1, ..PipelineConfig::default() };
        selector_with(CATALOG, &config, response)
    }

    fn list_assets(risk: RiskLevel) -> Decision {
        decision(IntentCategory::AssetManagement, "list", 0.9, risk, DecisionType::Information, vec![])
    }

    fn decision(
        category: IntentCategory,
        action: &str,
        confidence: f64,
        risk: RiskLevel,
        decision_type: DecisionType,
        entities: Vec<(EntityType, &str)>,
    ) -> Decision {
        Decision {
            schema_version: CONTRACT_VERSION,
            decision_id: DecisionId::new(),
            request_text: "request".to_string(),
            intent: Intent { category, action: action.to_string(), confidence },
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
            decision_type,
            created_at: Utc::now(),
        }
    }

    fn stop_db() -> Decision {
        decision(
            IntentCategory::ServiceManagement,
            "stop",
            0.95,
            RiskLevel::High,
            DecisionType::Action,
            vec![(EntityType::Hostname, "prod-db-01"), (EntityType::Service, "database")],
        )
    }

    // ── Direct selection ──────────────────────────────────────────────────

    #[tokio::test]
    async fn clear_winner_skips_backend() {
        let (selector, backend) = selector(None);
        let d = stop_db();
        let decision_id = d.decision_id;
        let s = selector.select(d).await.unwrap();

        assert_eq!(s.decision_id, decision_id);
        assert_eq!(s.selected_tools, vec!["service_stop"]);
        assert!(s.execution_policy.requires_approval);
        assert!(s.additional_inputs_needed.is_empty());
        assert_eq!(s.bound_inputs["service_stop"]["host"], json!("prod-db-01"));
        assert_eq!(s.targets, vec!["prod-db-01"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unbound_required_params_are_reported() {
        let (selector, _) = selector(None);
        let d = decision(
            IntentCategory::ServiceManagement,
            "stop",
            0.9,
            RiskLevel::Medium,
            DecisionType::Action,
            vec![(EntityType::Service, "nginx")],
        );
        let s = selector.select(d).await.unwrap();
        assert_eq!(s.additional_inputs_needed, BTreeSet::from(["host".to_string()]));
    }

    // ── Tie-break ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn exact_tie_follows_registry_order() {
        let (selector, backend) = selector(None);
        let ranked = selector.matcher().rank(&list_assets(RiskLevel::Low), "list");
        let scores: Vec<f64> = ranked.iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![1.0, 1.0, 1.0]);

        let s = selector.select(list_assets(RiskLevel::Low)).await.unwrap();
        assert_eq!(s.selected_tools, vec!["asset_inventory"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_tie_prefers_earlier_registration() {
        let catalog = r#"
            [[tools]]
            name = "asset_export"
            capabilities = ["asset_query"]
            is_production_safe = true

            [[tools]]
            name = "asset_inventory"
            capabilities = ["asset_query"]
            is_production_safe = true
        "#;
        let (selector, backend) = selector_with(catalog, &PipelineConfig::default(), None);
        let s = selector.select(list_assets(RiskLevel::Low)).await.unwrap();
        assert_eq!(s.selected_tools, vec!["asset_export"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn near_tie_goes_to_backend() {
        let (selector, backend) = near_tie_selector(Some(json!({
            "tool": "asset_snapshot",
            "confidence": 0.8,
            "justification": "a snapshot was requested"
        })));
        let s = selector.select(list_assets(RiskLevel::Medium)).await.unwrap();

        assert_eq!(s.selected_tools, vec!["asset_snapshot"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(s.justification.contains("a snapshot was requested"));
    }

    #[tokio::test]
    async fn exact_tie_loser_is_not_offered_to_backend() {
        let (selector, backend) = near_tie_selector(Some(json!({ "tool": "asset_export", "confidence": 0.9 })));
        let result = selector.select(list_assets(RiskLevel::Medium)).await;
        assert!(matches!(result, Err(OpsgateError::BackendUnavailable { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_fails_tie_break() {
        let (selector, _) = near_tie_selector(None);
        let result = selector.select(list_assets(RiskLevel::Medium)).await;
        assert!(matches!(result, Err(OpsgateError::BackendUnavailable { .. })));
    }

    #[tokio::test]
    async fn backend_pick_outside_candidates_is_malformed() {
        let (selector, _) = near_tie_selector(Some(json!({ "tool": "metrics_query", "confidence": 0.9 })));
        let result = selector.select(list_assets(RiskLevel::Medium)).await;
        assert!(matches!(result, Err(OpsgateError::BackendUnavailable { .. })));
    }

    // ── Edge cases ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn no_capable_tool_is_no_candidate() {
        let (selector, _) = selector(None);
        let d = decision(IntentCategory::NetworkDiagnostics, "ping", 0.9, RiskLevel::Low, DecisionType::Information, vec![]);
        match selector.select(d).await {
            Err(OpsgateError::NoCandidateTool { category, action }) => {
                assert_eq!(category, "network_diagnostics");
                assert_eq!(action, "ping");
            }
            other => panic!("expected NoCandidateTool, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ambiguous_decision_selects_with_low_confidence() {
        let (selector, _) = selector(None);
        let mut d = stop_db();
        d.intent.confidence = 0.3;
        d.decision_type = DecisionType::Ambiguous;
        let s = selector.select(d).await.unwrap();

        assert_eq!(s.decision_type, DecisionType::Ambiguous);
        assert!(s.selection_confidence <= 0.3);
        assert!(s.justification.contains("clarify"));
    }

    #[tokio::test]
    async fn composite_action_selects_each_step() {
        let (selector, _) = selector(None);
        let mut d = stop_db();
        d.intent.action = "restart".to_string();
        let s = selector.select(d).await.unwrap();
        assert_eq!(s.selected_tools, vec!["service_stop", "service_start"]);
    }

    #[tokio::test]
    async fn invalid_decision_is_rejected() {
        let (selector, _) = selector(None);
        let mut d = stop_db();
        d.intent.confidence = 1.5;
        assert!(matches!(selector.select(d).await, Err(OpsgateError::Validation { .. })));
    }

    #[test]
    fn matcher_is_deterministic() {
        let (selector, _) = selector(None);
        let d = list_assets(RiskLevel::Low);
        let first = selector.matcher().rank(&d, "list");
        for _ in 0..10 {
            assert_eq!(selector.matcher().rank(&d, "list"), first);
        }
        assert_eq!(first[0].tool, "asset_inventory");
    }
}
