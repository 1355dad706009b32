//! Simulated IT estate for the opsgate reference runtime.
//!
//! All hosts and backend answers in this module are hardcoded and fictional.
//! No external systems are contacted. The scripted backend stands in for an
//! LLM endpoint and `MockInventory` for a CMDB.

use std::net::IpAddr;

use serde_json::json;

use opsgate_backend::ScriptedBackend;
use opsgate_contracts::{backend::BackendTask, error::OpsgateResult};
use opsgate_core::traits::InventoryResolver;

// ── Embedded configuration ────────────────────────────────────────────────────

/// The reference tool catalog.
pub const CATALOG: &str = include_str!("../catalog/ops.toml");

/// The reference execution policy.
pub const POLICY: &str = include_str!("../policies/ops.toml");

// ── Requests ──────────────────────────────────────────────────────────────────

pub const LIST_ASSETS: &str = "Show me all assets";
pub const CHECK_DISK: &str = "Check disk usage on web-02";
pub const STOP_DB_ON_HOST: &str = "Stop the database service on prod-db-01";
pub const STOP_PROD_DB: &str = "Stop the production database";
pub const RESTART_NGINX: &str = "Restart nginx on web-01";
pub const FIX_IT: &str = "fix it";
pub const RESTART_IT: &str = "restart it";
pub const WINDOWS_CLEANUP: &str = r"Run C:\ops\cleanup.ps1 on all windows hosts";
pub const MACOS_CLEANUP: &str = "Run /opt/ops/cleanup.sh on all macos hosts";
pub const UNKNOWN_CATEGORY: &str = "Water the office plants";

// ── Reasoning backend (mock) ──────────────────────────────────────────────────

/// A backend that classifies every request above the way a well-behaved
/// LLM would.
///
/// `UNKNOWN_CATEGORY` gets a category outside the closed set, which the
/// response verifier must reject.
pub fn scripted_backend() -> ScriptedBackend {
    ScriptedBackend::new("scripted-ops")
        .respond(
            BackendTask::Classify,
            LIST_ASSETS,
            json!({ "category": "asset_management", "action": "list", "confidence": 0.92, "read_only": true }),
        )
        .respond(
            BackendTask::Classify,
            CHECK_DISK,
            json!({
                "category": "monitoring",
                "action": "check",
                "confidence": 0.88,
                "entities": [{ "type": "hostname", "value": "web-02", "confidence": 0.95 }]
            }),
        )
        .respond(
            BackendTask::Classify,
            STOP_DB_ON_HOST,
            json!({
                "category": "service_management",
                "action": "stop",
                "confidence": 0.93,
                "risk": "medium",
                "entities": [
                    { "type": "service", "value": "database" },
                    { "type": "hostname", "value": "prod-db-01", "confidence": 0.97 }
                ]
            }),
        )
        .respond(
            BackendTask::Classify,
            STOP_PROD_DB,
            json!({
                "category": "service_management",
                "action": "stop",
                "confidence": 0.9,
                "risk": "high",
                "entities": [
                    { "type": "environment", "value": "production" },
                    { "type": "service", "value": "database" }
                ]
            }),
        )
        .respond(
            BackendTask::Classify,
            RESTART_NGINX,
            json!({
                "category": "service_management",
                "action": "restart",
                "confidence": 0.9,
                "entities": [
                    { "type": "service", "value": "nginx", "confidence": 0.9 },
                    { "type": "hostname", "value": "web-01", "confidence": 0.95 }
                ]
            }),
        )
        .respond(
            BackendTask::Classify,
            FIX_IT,
            json!({ "category": "troubleshooting", "action": "fix", "confidence": 0.3 }),
        )
        .respond(
            BackendTask::Classify,
            RESTART_IT,
            json!({ "category": "service_management", "action": "restart", "confidence": 0.7 }),
        )
        .respond(
            BackendTask::Classify,
            WINDOWS_CLEANUP,
            json!({ "category": "automation", "action": "run", "confidence": 0.9 }),
        )
        .respond(
            BackendTask::Classify,
            MACOS_CLEANUP,
            json!({ "category": "automation", "action": "run", "confidence": 0.9 }),
        )
        .respond(
            BackendTask::Classify,
            UNKNOWN_CATEGORY,
            json!({ "category": "gardening", "action": "water", "confidence": 0.95 }),
        )
}

// ── Inventory (mock) ──────────────────────────────────────────────────────────

/// (hostname, os family)
const HOSTS: &[(&str, &str)] = &[
    ("web-01", "linux"),
    ("web-02", "linux"),
    ("prod-db-01", "linux"),
    ("win-app-01", "windows"),
    ("win-app-02", "windows"),
];

/// A fixed five-host estate.
///
/// An OS family resolves to its hosts, a known hostname to itself, and an
/// IP address passes through unchanged. Anything else resolves to nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockInventory;

impl InventoryResolver for MockInventory {
    fn resolve(&self, target: &str) -> OpsgateResult<Vec<String>> {
        let target = target.trim().to_lowercase();

        let family: Vec<String> = HOSTS
            .iter()
            .filter(|(_, os)| *os == target)
            .map(|(host, _)| host.to_string())
            .collect();
        if !family.is_empty() {
            return Ok(family);
        }

        if HOSTS.iter().any(|(host, _)| *host == target) || target.parse::<IpAddr>().is_ok() {
            return Ok(vec![target]);
        }
        Ok(Vec::new())
    }
}
