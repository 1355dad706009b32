//! IT operations reference scenarios.
//!
//! Each scenario wires the real opsgate components (registry, policy engine,
//! verifier, audit writer) around the scripted backend and mock inventory,
//! runs one or more requests, and prints every stage.

use opsgate_contracts::error::{OpsgateError, OpsgateResult};

pub mod ambiguous_request;
pub mod asset_inventory;
pub mod backend_failures;
pub mod cyclic_catalog;
pub mod fleet_script;
pub mod production_stop;
pub mod service_restart;

/// Every scenario, in demo order.
pub const ALL: &[&str] = &[
    "asset-inventory",
    "production-stop",
    "ambiguous-request",
    "backend-failures",
    "service-restart",
    "fleet-script",
    "cyclic-catalog",
];

/// Run the scenario registered under `name`.
pub async fn run(name: &str) -> OpsgateResult<()> {
    match name {
        "asset-inventory" => asset_inventory::run_scenario().await,
        "production-stop" => production_stop::run_scenario().await,
        "ambiguous-request" => ambiguous_request::run_scenario().await,
        "backend-failures" => backend_failures::run_scenario().await,
        "service-restart" => service_restart::run_scenario().await,
        "fleet-script" => fleet_script::run_scenario().await,
        "cyclic-catalog" => cyclic_catalog::run_scenario().await,
        other => Err(OpsgateError::ConfigError {
            reason: format!("unknown scenario '{other}' (expected one of: {})", ALL.join(", ")),
        }),
    }
}
