//! Console rendering of pipeline artifacts for the demo scenarios.

use opsgate_audit::InMemoryAuditWriter;
use opsgate_contracts::{
    error::OpsgateError,
    plan::{ParameterValue, Plan, RollbackStep},
    selection::Selection,
};
use opsgate_core::PipelineOutcome;

fn render_value(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Literal { value } => value.to_string(),
        ParameterValue::Placeholder { parameter } => format!("<{parameter}?>"),
        ParameterValue::StepOutput { step_id, output } => format!("{step_id}.{output}"),
    }
}

pub fn print_selection(selection: &Selection) {
    let policy = &selection.execution_policy;
    println!("  Selected tools:         {}", selection.selected_tools.join(", "));
    println!("  Selection confidence:   {:.2}", selection.selection_confidence);
    println!(
        "  Execution policy:       tier={} approval={} parallel={} approver={}",
        policy.risk_tier,
        policy.requires_approval,
        policy.parallelizable,
        policy.approver_role.as_deref().unwrap_or("-")
    );
    if !selection.additional_inputs_needed.is_empty() {
        let needed: Vec<&str> = selection.additional_inputs_needed.iter().map(String::as_str).collect();
        println!("  Inputs still needed:    {}", needed.join(", "));
    }
    println!("  Justification:          {}", selection.justification);
}

pub fn print_plan(plan: &Plan) {
    println!("  Plan {} ({} step(s))", plan.plan_id, plan.steps.len());
    for step in &plan.steps {
        let params: Vec<String> = step
            .parameters
            .iter()
            .map(|(name, value)| format!("{name}={}", render_value(value)))
            .collect();
        let deps: Vec<String> = step.depends_on.iter().map(ToString::to_string).collect();
        println!(
            "    {} {}({}) after [{}] timeout={}s",
            step.step_id,
            step.tool_name,
            params.join(", "),
            deps.join(", "),
            step.timeout_secs
        );
    }
    for check in &plan.safety_checks {
        println!("    check {:?}/{:?} on {}: {}", check.phase, check.kind, check.step_id, check.description);
    }
    for (step_id, rollback) in &plan.rollback_steps {
        match rollback {
            RollbackStep::Compensate { tool_name, .. } => println!("    rollback {step_id}: run {tool_name}"),
            RollbackStep::NoSafeInverse { reason } => println!("    rollback {step_id}: none ({reason})"),
        }
    }
    let waves: Vec<String> = plan
        .execution_waves()
        .iter()
        .map(|wave| wave.iter().map(ToString::to_string).collect::<Vec<_>>().join(" + "))
        .collect();
    println!("    waves: {}", waves.join(" -> "));
}

pub fn print_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Planned(plan) => {
            println!("  Outcome:                PLANNED");
            print_plan(plan);
        }
        PipelineOutcome::NeedsClarification { selection, prompt } => {
            println!("  Outcome:                NEEDS CLARIFICATION");
            println!("  Prompt:                 {prompt}");
            match selection {
                Some(selection) => print_selection(selection),
                None => println!("  Selected tools:         (none)"),
            }
        }
    }
}

pub fn print_error(error: &OpsgateError) {
    println!("  Outcome:                FAILED ({})", error.kind());
    println!("  Error:                  {error}");
}

pub fn print_audit(audit: &InMemoryAuditWriter) {
    println!(
        "  Audit chain integrity:  {} ({} event(s) in chain)",
        if audit.verify_integrity() { "VERIFIED" } else { "FAILED" },
        audit.len()
    );
}
