//! The request-to-plan driver.
//!
//!   text → [Classifier] → Decision → [Selector] → Selection → [Planner] → Plan
//!
//! Each finalized artifact is written to the audit trail exactly once,
//! before it is handed to the next stage. Stage errors propagate unchanged.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use opsgate_contracts::{
    audit::AuditRecord,
    decision::{Decision, RequestContext},
    error::{OpsgateError, OpsgateResult},
    plan::Plan,
    selection::Selection,
};
use opsgate_registry::ToolRegistry;

use crate::{
    classifier::Classifier,
    config::PipelineConfig,
    gateway::BackendGateway,
    planner::Planner,
    selector::Selector,
    traits::{AuditWriter, InventoryResolver, PolicyEngine, ReasoningBackend, ResponseVerifier},
};

/// What a successful pipeline run produced.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The request was clear enough to plan.
    Planned(Plan),
    /// The Decision was ambiguous. No Plan is built until the requester
    /// clarifies. The Selection is included when one could be made; a vague
    /// verb no tool serves leaves it empty rather than failing the run.
    NeedsClarification { selection: Option<Selection>, prompt: String },
}

pub struct Pipeline {
    classifier: Classifier,
    selector: Selector,
    planner: Planner,
    audit: Arc<dyn AuditWriter>,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn ReasoningBackend>,
        verifier: Arc<dyn ResponseVerifier>,
        policy: Arc<dyn PolicyEngine>,
        audit: Arc<dyn AuditWriter>,
    ) -> Self {
        let gateway = Arc::new(BackendGateway::new(backend, verifier, config.backend_timeout()));
        Self {
            classifier: Classifier::new(gateway.clone()),
            selector: Selector::new(registry.clone(), policy, gateway, config),
            planner: Planner::new(registry, config.default_step_timeout_secs),
            audit,
        }
    }

    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryResolver>) -> Self {
        self.planner = self.planner.with_inventory(inventory);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Run one request through all three stages.
    ///
    /// # Errors
    ///
    /// Any stage error, or an audit write failure. An ambiguous request is
    /// not an error: it returns `NeedsClarification`, even when no tool
    /// serves its verb.
    pub async fn run(&self, request_text: &str, context: &RequestContext) -> OpsgateResult<PipelineOutcome> {
        // ── Stage A: classify ────────────────────────────────────────────────
        let decision = self.classifier.classify(request_text, context).await?;
        let decision_id = decision.decision_id;
        self.audit.write(&AuditRecord::decision(&decision))?;

        let clarification = decision.is_ambiguous().then(|| clarification_prompt(&decision));

        // ── Stage B: select ──────────────────────────────────────────────────
        let selection = match (self.selector.select(decision).await, clarification) {
            (Ok(selection), None) => selection,
            (Ok(selection), Some(prompt)) => {
                self.audit.write(&AuditRecord::selection(&selection))?;
                info!(
                    decision_id = %decision_id,
                    selection_id = %selection.selection_id,
                    confidence = selection.selection_confidence,
                    "request is ambiguous, asking for clarification"
                );
                self.audit.finalize(&decision_id)?;
                return Ok(PipelineOutcome::NeedsClarification { selection: Some(selection), prompt });
            }
            (Err(OpsgateError::NoCandidateTool { category, action }), Some(prompt)) => {
                info!(
                    decision_id = %decision_id,
                    %category,
                    %action,
                    "ambiguous request matches no tool, asking for clarification"
                );
                self.audit.finalize(&decision_id)?;
                return Ok(PipelineOutcome::NeedsClarification { selection: None, prompt });
            }
            (Err(e), _) => return Err(e),
        };
        self.audit.write(&AuditRecord::selection(&selection))?;

        // ── Stage C: plan ────────────────────────────────────────────────────
        let plan = self.planner.plan(selection)?;
        self.audit.write(&AuditRecord::plan(&plan))?;
        self.audit.finalize(&decision_id)?;

        debug!(decision_id = %decision_id, plan_id = %plan.plan_id, "pipeline complete");
        Ok(PipelineOutcome::Planned(plan))
    }

    /// Run independent requests concurrently. One result per input, in
    /// input order.
    pub async fn run_batch(
        &self,
        texts: &[String],
        context: &RequestContext,
    ) -> Vec<OpsgateResult<PipelineOutcome>> {
        join_all(texts.iter().map(|text| self.run(text, context))).await
    }
}

/// A question for the requester naming what the classifier could not pin
/// down.
pub fn clarification_prompt(decision: &Decision) -> String {
    let present = decision.entity_types();
    let missing: Vec<&str> = decision
        .intent
        .category
        .expected_entities()
        .iter()
        .filter(|kind| !present.contains(*kind))
        .map(|kind| kind.as_str())
        .collect();

    let mut prompt = format!(
        "I am not sure what \"{}\" should do. It reads as '{}' for {} (confidence {:.2}).",
        decision.request_text.trim(),
        decision.intent.action,
        decision.intent.category,
        decision.intent.confidence
    );
    if !missing.is_empty() {
        prompt.push_str(&format!(" Please name the {}.", missing.join(" and ").replace('_', " ")));
    } else {
        prompt.push_str(" Please restate the request with the exact target and action.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use opsgate_contracts::{
        audit::AuditStage,
        backend::{BackendRequest, BackendTask, ResponseSchema, VerificationReport},
        error::OpsgateError,
        ids::DecisionId,
        intent::{DecisionType, RiskLevel},
        selection::ExecutionPolicy,
        tool::Tool,
    };

    use super::*;

    // ── Mocks ─────────────────────────────────────────────────────────────

    struct ClassifyOnly {
        by_text: Vec<(&'static str, Value)>,
    }

    #[async_trait]
    impl ReasoningBackend for ClassifyOnly {
        async fn invoke(&self, request: &BackendRequest) -> OpsgateResult<Value> {
            match request.task {
                BackendTask::Classify => self
                    .by_text
                    .iter()
                    .find(|(t, _)| *t == request.input)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| OpsgateError::BackendUnavailable { reason: "unknown text".to_string() }),
                BackendTask::SelectTool => {
                    Err(OpsgateError::BackendUnavailable { reason: "no tie-break expected".to_string() })
                }
            }
        }

        fn name(&self) -> &str {
            "classify-only"
        }
    }

    struct PassVerifier;

    impl ResponseVerifier for PassVerifier {
        fn verify(&self, _response: &Value, _schema: &ResponseSchema) -> OpsgateResult<VerificationReport> {
            Ok(VerificationReport::pass())
        }
    }

    struct MockPolicy;

    impl PolicyEngine for MockPolicy {
        fn derive_policy(&self, decision: &Decision, tool: &Tool) -> OpsgateResult<ExecutionPolicy> {
            Ok(ExecutionPolicy {
                requires_approval: !tool.is_production_safe || decision.risk_level >= RiskLevel::High,
                parallelizable: decision.decision_type == DecisionType::Information,
                risk_tier: decision.risk_level,
                approver_role: None,
            })
        }
    }

    #[derive(Default)]
    struct MockAudit {
        records: Mutex<Vec<(DecisionId, AuditStage)>>,
        finalized: Mutex<Vec<DecisionId>>,
        fail_on: Option<AuditStage>,
    }

    impl AuditWriter for MockAudit {
        fn write(&self, record: &AuditRecord) -> OpsgateResult<()> {
            if self.fail_on == Some(record.stage()) {
                return Err(OpsgateError::AuditWriteFailed { reason: "disk full".to_string() });
            }
            self.records.lock().unwrap().push((record.decision_id, record.stage()));
            Ok(())
        }

        fn finalize(&self, decision_id: &DecisionId) -> OpsgateResult<()> {
            self.finalized.lock().unwrap().push(*decision_id);
            Ok(())
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
    "#;

    fn pipeline(audit: Arc<MockAudit>) -> Pipeline {
        let backend = ClassifyOnly {
            by_text: vec![
                (
                    "Show me all assets",
                    json!({ "category": "asset_management", "action": "list", "confidence": 0.9 }),
                ),
                ("show it", json!({ "category": "asset_management", "action": "show", "confidence": 0.05 })),
                ("fix it", json!({ "category": "troubleshooting", "action": "fix", "confidence": 0.3 })),
            ],
        };
        Pipeline::new(
            &PipelineConfig::default(),
            Arc::new(ToolRegistry::from_toml_str(CATALOG).unwrap()),
            Arc::new(backend),
            Arc::new(PassVerifier),
            Arc::new(MockPolicy),
            audit,
        )
    }

    #[tokio::test]
    async fn clear_request_is_planned_and_audited_once_per_stage() {
        let audit = Arc::new(MockAudit::default());
        let outcome = pipeline(audit.clone()).run("Show me all assets", &RequestContext::default()).await.unwrap();

        let plan = match outcome {
            PipelineOutcome::Planned(plan) => plan,
            other => panic!("expected Planned, got {:?}", other),
        };
        assert_eq!(plan.steps[0].tool_name, "asset_inventory");

        let records = audit.records.lock().unwrap();
        let stages: Vec<AuditStage> = records.iter().map(|(_, s)| *s).collect();
        assert_eq!(stages, vec![AuditStage::Decision, AuditStage::Selection, AuditStage::Plan]);
        assert!(records.iter().all(|(id, _)| *id == plan.decision_id));
        assert_eq!(*audit.finalized.lock().unwrap(), vec![plan.decision_id]);
    }

    #[tokio::test]
    async fn ambiguous_request_needs_clarification() {
        let audit = Arc::new(MockAudit::default());
        let outcome = pipeline(audit.clone()).run("show it", &RequestContext::default()).await.unwrap();

        match outcome {
            PipelineOutcome::NeedsClarification { selection: Some(selection), prompt } => {
                assert_eq!(selection.decision_type, DecisionType::Ambiguous);
                assert!(prompt.contains("show it"));
            }
            other => panic!("expected NeedsClarification, got {:?}", other),
        }
        let stages: Vec<AuditStage> = audit.records.lock().unwrap().iter().map(|(_, s)| *s).collect();
        assert_eq!(stages, vec![AuditStage::Decision, AuditStage::Selection]);
    }

    #[tokio::test]
    async fn ambiguous_request_without_candidates_still_asks() {
        let audit = Arc::new(MockAudit::default());
        let outcome = pipeline(audit.clone()).run("fix it", &RequestContext::default()).await.unwrap();

        match outcome {
            PipelineOutcome::NeedsClarification { selection: None, prompt } => {
                assert!(prompt.contains("fix it"));
                assert!(prompt.contains("hostname"), "prompt should ask for the missing host: {prompt}");
            }
            other => panic!("expected NeedsClarification without a selection, got {:?}", other),
        }
        let stages: Vec<AuditStage> = audit.records.lock().unwrap().iter().map(|(_, s)| *s).collect();
        assert_eq!(stages, vec![AuditStage::Decision]);
        assert_eq!(audit.finalized.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn audit_failure_is_fatal() {
        let audit = Arc::new(MockAudit { fail_on: Some(AuditStage::Selection), ..Default::default() });
        let result = pipeline(audit.clone()).run("Show me all assets", &RequestContext::default()).await;
        assert!(matches!(result, Err(OpsgateError::AuditWriteFailed { .. })));
        assert!(audit.finalized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_runs_are_isolated() {
        let audit = Arc::new(MockAudit::default());
        let texts = vec!["Show me all assets".to_string(), "reboot the moon".to_string()];
        let results = pipeline(audit).run_batch(&texts, &RequestContext::default()).await;
        assert!(matches!(results[0], Ok(PipelineOutcome::Planned(_))));
        assert!(matches!(results[1], Err(OpsgateError::BackendUnavailable { .. })));
    }
}
