//! Scenario 6: Fleet script
//!
//! "all windows hosts" names a group, not a host. The planner resolves it
//! through the inventory and fills the host parameter with every match.
//! The scripts rule forces sequential execution and sign-off, and a script
//! has no safe inverse.
//!
//! The same request aimed at macOS resolves to nothing, and planning stops
//! with `UnplannableSelection` after the Decision and Selection are already
//! on record.

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};

use crate::{
    mock_data::{scripted_backend, MACOS_CLEANUP, WINDOWS_CLEANUP},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Run Scenario 6: Fleet script.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 6: Fleet script ===");
    println!();

    let runtime = OpsRuntime::reference(Arc::new(scripted_backend()))?;

    for text in [WINDOWS_CLEANUP, MACOS_CLEANUP] {
        println!("  Request:                \"{text}\"");
        match runtime.pipeline.run(text, &RequestContext::default()).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => print_error(&e),
        }
        println!();
    }

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 6 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use opsgate_contracts::{
        error::OpsgateError,
        plan::{CheckKind, ParameterValue, RollbackStep},
    };
    use opsgate_core::PipelineOutcome;

    use super::*;

    #[tokio::test]
    async fn os_family_target_expands_through_inventory() {
        let runtime = OpsRuntime::reference(Arc::new(scripted_backend())).unwrap();
        let plan = match runtime.pipeline.run(WINDOWS_CLEANUP, &RequestContext::default()).await.unwrap() {
            PipelineOutcome::Planned(plan) => plan,
            other => panic!("expected a plan, got {:?}", other),
        };

        assert_eq!(plan.steps.len(), 1);
        let step = &plan.steps[0];
        assert_eq!(step.tool_name, "script_run");
        assert_eq!(step.targets, vec!["win-app-01", "win-app-02"]);
        assert_eq!(
            step.parameters["host"],
            ParameterValue::Literal { value: json!(["win-app-01", "win-app-02"]) }
        );
        assert_eq!(step.parameters["script"], ParameterValue::Literal { value: json!(r"C:\ops\cleanup.ps1") });
        assert_eq!(step.timeout_secs, 900);

        assert!(plan.execution_policy.requires_approval);
        assert!(!plan.execution_policy.parallelizable);
        assert_eq!(plan.execution_policy.approver_role.as_deref(), Some("service_owner"));
        assert!(plan.safety_checks.iter().any(|c| c.kind == CheckKind::TargetReachable));
        assert!(matches!(plan.rollback_steps[&step.step_id], RollbackStep::NoSafeInverse { .. }));
    }

    #[tokio::test]
    async fn empty_group_is_unplannable() {
        let runtime = OpsRuntime::reference(Arc::new(scripted_backend())).unwrap();
        match runtime.pipeline.run(MACOS_CLEANUP, &RequestContext::default()).await {
            Err(OpsgateError::UnplannableSelection { reason }) => assert!(reason.contains("macos")),
            other => panic!("expected UnplannableSelection, got {:?}", other),
        }
        // decision and selection recorded, no plan
        assert_eq!(runtime.audit.len(), 2);
        assert!(runtime.audit.verify_integrity());
    }
}
