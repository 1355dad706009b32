//! Scenario 2: Stop the production database
//!
//! Production plus a destructive verb lands at high risk. The stop tool is
//! not production safe and the production rule names the on-call SRE as
//! approver. Every plan step rolls back by starting the service again.
//!
//!   a. "prod-db-01" names the host, which also marks it as production
//!   b. "the production database" names no host, so the plan carries a
//!      placeholder the caller must fill before execution

use std::sync::Arc;

use opsgate_contracts::{decision::RequestContext, error::OpsgateResult};

use crate::{
    mock_data::{scripted_backend, STOP_DB_ON_HOST, STOP_PROD_DB},
    report::{print_audit, print_error, print_outcome},
    runtime::OpsRuntime,
};

/// Run Scenario 2: Stop the production database.
pub async fn run_scenario() -> OpsgateResult<()> {
    println!("=== Scenario 2: Stop the production database ===");
    println!();

    let runtime = OpsRuntime::reference(Arc::new(scripted_backend()))?;
    let context = RequestContext { requester: Some("bob".to_string()), ..Default::default() };

    for text in [STOP_DB_ON_HOST, STOP_PROD_DB] {
        println!("  Request:                \"{text}\"");
        match runtime.pipeline.run(text, &context).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => print_error(&e),
        }
        println!();
    }

    print_audit(&runtime.audit);
    println!();
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
