//! Scenario 7: Contradictory ordering metadata
//!
//! A misconfigured catalog says stop must precede start and start must
//! precede stop, on every target. The planner cannot order the restart and
//! refuses with `CyclicDependency` rather than emitting a plan with a
//! cycle in it.

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};
use opsgate_core::PipelineConfig;

use crate::{
    mock_data::{scripted_backend, RESTART_NGINX},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Two service tools whose global orderings contradict each other.
pub const BROKEN_CATALOG: &str = r#"
[[tools]]
name = "service_stop"
capabilities = ["service_control"]
actions = ["stop"]

[tools.input_schema.host]
required = true
type = "hostname"

[tools.input_schema.service]
type = "service"

[[tools]]
name = "service_start"
capabilities = ["service_control"]
actions = ["start"]

[tools.input_schema.host]
required = true
type = "hostname"

[tools.input_schema.service]
type = "service"

[[ordering]]
before = "service_stop"
after = "service_start"
scope = "global"

[[ordering]]
before = "service_start"
after = "service_stop"
scope = "global"

[[composites]]
action = "restart"
sequence = ["stop", "start"]
"#;

/// Run Scenario 7: Contradictory ordering metadata.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 7: Contradictory ordering metadata ===");
    println!();

    let runtime = OpsRuntime::build(BROKEN_CATALOG, &PipelineConfig::default(), Arc::new(scripted_backend()))?;

    println!("  Request:                \"{RESTART_NGINX}\"");
    match runtime.pipeline.run(RESTART_NGINX, &RequestContext::default()).await {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => print_error(&e),
    }
    println!();

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 7 complete.");
    println!();
    Ok(())
}
