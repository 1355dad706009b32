//! Scenario 3: Ambiguous requests
//!
//! "fix it" scores low on every confidence term: the backend is unsure, no
//! host is named, and the text is a pronoun plus a vague verb. No tool
//! serves "fix", so the requester gets a prompt and no Selection.
//!
//! "restart it" is just as ambiguous, but restart expands to stop and
//! start. The Selection is still made and recorded, with its confidence
//! scaled down, and planning waits for the requester.

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};

use crate::{
    mock_data::{scripted_backend, FIX_IT, RESTART_IT},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Run Scenario 3: Ambiguous requests.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 3: Ambiguous requests ===");
    println!();

    let runtime = OpsRuntime::reference(Arc::new(scripted_backend()))?;
    let context = RequestContext::default();

    for text in [FIX_IT, RESTART_IT] {
        println!("  Request:                \"{text}\"");
        match runtime.pipeline.run(text, &context).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => print_error(&e),
        }
        println!();
    }

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use opsgate_contracts::audit::{AuditPayload, AuditStage};
    use opsgate_core::PipelineOutcome;

    use super::*;

    #[tokio::test]
    async fn vague_request_asks_for_a_host() {
        let runtime = OpsRuntime::reference(Arc::new(scripted_backend())).unwrap();
        match runtime.pipeline.run(FIX_IT, &RequestContext::default()).await.unwrap() {
            PipelineOutcome::NeedsClarification { selection: None, prompt } => {
                assert!(prompt.contains("fix it"), "prompt should quote the request: {prompt}");
                assert!(prompt.contains("hostname"), "prompt should ask for a host: {prompt}");
            }
            other => panic!("expected clarification without a selection, got {:?}", other),
        }

        let log = runtime.audit.export_log().unwrap();
        assert_eq!(log.events.len(), 1);
        match &log.events[0].record.payload {
            AuditPayload::Decision(decision) => assert!(decision.is_ambiguous()),
            other => panic!("expected the decision, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ambiguous_restart_selects_but_does_not_plan() {
        let runtime = OpsRuntime::reference(Arc::new(scripted_backend())).unwrap();
        let selection = match runtime.pipeline.run(RESTART_IT, &RequestContext::default()).await.unwrap() {
            PipelineOutcome::NeedsClarification { selection: Some(selection), prompt } => {
                assert!(prompt.contains("service"), "prompt should ask for the service: {prompt}");
                selection
            }
            other => panic!("expected clarification with a selection, got {:?}", other),
        };

        assert_eq!(selection.selected_tools, vec!["service_stop", "service_start"]);
        assert!(selection.selection_confidence < 0.5);
        assert!(selection.justification.contains("ambiguous"));

        let stages: Vec<AuditStage> =
            runtime.audit.records_for(&selection.decision_id).iter().map(|r| r.stage()).collect();
        assert_eq!(stages, vec![AuditStage::Decision, AuditStage::Selection]);
    }
}
