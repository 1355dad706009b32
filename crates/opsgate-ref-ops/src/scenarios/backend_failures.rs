//! Scenario 4: Backend failures
//!
//! The reasoning backend is untrusted and may be slow or absent. Three
//! failure modes, one outcome: `BackendUnavailable`, and nothing reaches
//! the audit trail because no Decision was ever finalized.
//!
//!   a. the backend hangs past the 50 ms gateway timeout
//!   b. the backend refuses the connection
//!   c. the backend answers with a category outside the closed set and the
//!      response verifier rejects it

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use opsgate_backend::{Script, ScriptedBackend};
use opsgate_contracts::{backend::BackendTask, decision::RequestContext, error::OpsgateResult};
use opsgate_core::{traits::ReasoningBackend, PipelineConfig};

use crate::{
    mock_data::{scripted_backend, CATALOG, CHECK_DISK, UNKNOWN_CATEGORY},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

pub const GATEWAY_TIMEOUT_MS: u64 = 50;

/// A backend that answers the disk check, but only after 300 ms.
pub fn slow_backend() -> ScriptedBackend {
    ScriptedBackend::new("slow-llm").on(
        BackendTask::Classify,
        CHECK_DISK,
        Script::Delayed(
            Duration::from_millis(300),
            json!({ "category": "monitoring", "action": "check", "confidence": 0.9 }),
        ),
    )
}

/// A backend whose every call is refused.
pub fn down_backend() -> ScriptedBackend {
    ScriptedBackend::new("down-llm").with_fallback(Script::Unreachable("connection refused".to_string()))
}

fn runtime(backend: Arc<dyn ReasoningBackend>) -> OpsgateResult<OpsRuntime> {
    let config = PipelineConfig { backend_timeout_ms: GATEWAY_TIMEOUT_MS, ..Default::default() };
    OpsRuntime::build(CATALOG, &config, backend)
}

/// Run Scenario 4: Backend failures.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 4: Backend failures ===");
    println!();

    let slow: Arc<dyn ReasoningBackend> = Arc::new(slow_backend());
    let down: Arc<dyn ReasoningBackend> = Arc::new(down_backend());
    let confused: Arc<dyn ReasoningBackend> = Arc::new(scripted_backend());
    let cases = [
        ("4a. hung backend", slow, CHECK_DISK),
        ("4b. unreachable backend", down, CHECK_DISK),
        ("4c. malformed response", confused, UNKNOWN_CATEGORY),
    ];

    for (label, backend, text) in cases {
        println!("  {label}");
        println!("  Request:                \"{text}\"");
        let runtime = runtime(backend)?;
        match runtime.pipeline.run(text, &RequestContext::default()).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => print_error(&e),
        }
        print_audit(&runtime.audit);
        println!();
    }

    println!("  Scenario 4 complete.");
    println!();
    Ok(())
}
