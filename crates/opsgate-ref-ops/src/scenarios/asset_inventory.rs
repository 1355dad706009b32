//! Scenario 1: Asset inventory
//!
//! A read-only request the backend classifies confidently. The asset tool
//! outranks the fleet dashboard on capability overlap, so the backend is
//! never asked to pick. Low risk, production-safe, no approval, and the
//! single step may run in parallel with anything else.
//!
//! The same run batches a disk check on web-02 to show that independent
//! requests get independent decisions in one audit chain.

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};

use crate::{
    mock_data::{scripted_backend, CHECK_DISK, LIST_ASSETS},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Run Scenario 1: Asset inventory.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 1: Asset inventory ===");
    println!();

    let runtime = OpsRuntime::reference(Arc::new(scripted_backend()))?;
    let context = RequestContext { requester: Some("alice".to_string()), ..Default::default() };

    let requests = vec![LIST_ASSETS.to_string(), CHECK_DISK.to_string()];
    let results = runtime.pipeline.run_batch(&requests, &context).await;

    for (text, result) in requests.iter().zip(&results) {
        println!("  Request:                \"{text}\"");
        match result {
            Ok(outcome) => print_outcome(outcome),
            Err(e) => print_error(e),
        }
        println!();
    }

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use opsgate_contracts::{
        intent::RiskLevel,
        plan::{ParameterValue, Plan},
    };
    use opsgate_core::PipelineOutcome;

    use super::*;

    fn planned(outcome: PipelineOutcome) -> Plan {
        match outcome {
            PipelineOutcome::Planned(plan) => plan,
            other => panic!("expected a plan, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn asset_request_plans_without_approval() {
        let runtime = OpsRuntime::reference(Arc::new(scripted_backend())).unwrap();
        let plan = planned(runtime.pipeline.run(LIST_ASSETS, &RequestContext::default()).await.unwrap());

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool_name, "asset_inventory");
        assert!(!plan.execution_policy.requires_approval);
        assert!(plan.execution_policy.parallelizable);
        assert_eq!(plan.execution_policy.risk_tier, RiskLevel::Low);
        assert!(plan.safety_checks.is_empty());
        assert!(plan.rollback_steps.is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_requests_independent() {
        let backend = Arc::new(scripted_backend());
        let runtime = OpsRuntime::reference(backend.clone()).unwrap();
        let requests = vec![LIST_ASSETS.to_string(), CHECK_DISK.to_string()];

        let results = runtime.pipeline.run_batch(&requests, &RequestContext::default()).await;
        assert_eq!(results.len(), 2);

        let plans: Vec<Plan> = results.into_iter().map(|r| planned(r.unwrap())).collect();
        assert_ne!(plans[0].decision_id, plans[1].decision_id);
        assert_eq!(plans[1].steps[0].tool_name, "metrics_query");
        assert_eq!(
            plans[1].steps[0].parameters["host"],
            ParameterValue::Literal { value: json!("web-02") }
        );

        // classification only: both top matches cleared the threshold alone
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(runtime.audit.len(), 6);
        assert!(runtime.audit.verify_integrity());
    }
}
