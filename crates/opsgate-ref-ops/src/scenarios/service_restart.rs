//! Scenario 5: Restart nginx on web-01
//!
//! No tool serves "restart" directly. The catalog's composite expands it
//! into stop then start, and the same-target ordering constraint makes the
//! start step wait for the stop step. Both steps claim web-01 exclusively,
//! which is fine because they are ordered. Each step rolls back through the
//! other tool.

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};

use crate::{
    mock_data::{scripted_backend, RESTART_NGINX},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Run Scenario 5: Restart nginx on web-01.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 5: Restart nginx on web-01 ===");
    println!();

    let runtime = OpsRuntime::reference(Arc::new(scripted_backend()))?;

    println!("  Request:                \"{RESTART_NGINX}\"");
    match runtime.pipeline.run(RESTART_NGINX, &RequestContext::default()).await {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => print_error(&e),
    }
    println!();

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 5 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use opsgate_contracts::{
        ids::StepId,
        intent::RiskLevel,
        plan::{ParameterValue, RollbackStep},
    };
    use opsgate_core::PipelineOutcome;

    use super::*;

    #[tokio::test]
    async fn restart_expands_to_ordered_stop_and_start() {
        let backend = Arc::new(scripted_backend());
        let runtime = OpsRuntime::reference(backend.clone()).unwrap();
        let plan = match runtime.pipeline.run(RESTART_NGINX, &RequestContext::default()).await.unwrap() {
            PipelineOutcome::Planned(plan) => plan,
            other => panic!("expected a plan, got {:?}", other),
        };

        let tools: Vec<&str> = plan.steps.iter().map(|s| s.tool_name.as_str()).collect();
        assert_eq!(tools, vec!["service_stop", "service_start"]);
        assert!(plan.steps[1].depends_on.contains(&StepId::nth(1)));
        assert_eq!(plan.execution_waves(), vec![vec![StepId::nth(1)], vec![StepId::nth(2)]]);

        for step in &plan.steps {
            assert_eq!(step.targets, vec!["web-01"]);
            assert_eq!(step.parameters["host"], ParameterValue::Literal { value: json!("web-01") });
            assert_eq!(step.parameters["service"], ParameterValue::Literal { value: json!("nginx") });
        }

        let inverse = |step: usize| match &plan.rollback_steps[&StepId::nth(step)] {
            RollbackStep::Compensate { tool_name, .. } => tool_name.clone(),
            other => panic!("expected a compensating rollback, got {:?}", other),
        };
        assert_eq!(inverse(1), "service_start");
        assert_eq!(inverse(2), "service_stop");

        assert_eq!(plan.execution_policy.risk_tier, RiskLevel::Medium);
        assert!(plan.execution_policy.requires_approval);
        assert_eq!(plan.execution_policy.approver_role.as_deref(), Some("service_owner"));

        // both sub-actions cleared the threshold without a tie-break
        assert_eq!(backend.calls().len(), 1);
    }
}
