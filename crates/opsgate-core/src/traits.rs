//! Trait seams of the opsgate pipeline.
//!
//! - `ReasoningBackend`:  untrusted, possibly slow, possibly absent
//! - `ResponseVerifier`:  trusted checker for every backend response
//! - `PolicyEngine`:      trusted source of execution policies
//! - `AuditWriter`:       trusted append-only sink for finalized artifacts
//! - `InventoryResolver`: injectable expansion of group targets into hosts
//!
//! The stages depend only on these traits, so unit tests substitute fixed
//! stubs while integration runs wire in the real components.

use async_trait::async_trait;
use serde_json::Value;

use opsgate_contracts::{
    audit::AuditRecord,
    backend::{BackendRequest, ResponseSchema, VerificationReport},
    decision::Decision,
    error::OpsgateResult,
    ids::DecisionId,
    selection::ExecutionPolicy,
    tool::Tool,
};

/// The external reasoning service (typically an LLM endpoint).
///
/// Implementations are **untrusted**: the pipeline never assumes the
/// returned value is well-formed. Callers go through `BackendGateway`, which
/// adds the timeout and runs the `ResponseVerifier`.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Send one request and return the raw structured response.
    async fn invoke(&self, request: &BackendRequest) -> OpsgateResult<Value>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Checks a raw backend response against the schema the request declared.
///
/// Must not call the backend. Returns a report with `passed = false` and
/// populated `failures` when any check fails.
pub trait ResponseVerifier: Send + Sync {
    fn verify(&self, response: &Value, schema: &ResponseSchema) -> OpsgateResult<VerificationReport>;
}

/// Derives how a selected tool may be executed for a Decision.
///
/// Implementations are **trusted** and must be deterministic.
pub trait PolicyEngine: Send + Sync {
    fn derive_policy(&self, decision: &Decision, tool: &Tool) -> OpsgateResult<ExecutionPolicy>;
}

/// Append-only audit sink keyed by `decision_id`.
///
/// Each finalized Decision, Selection, and Plan is written exactly once.
/// A failed write is fatal to the pipeline call.
pub trait AuditWriter: Send + Sync {
    /// Append one record. Implementations reject a second record for the
    /// same (decision_id, stage).
    fn write(&self, record: &AuditRecord) -> OpsgateResult<()>;

    /// Mark the request identified by `decision_id` as complete.
    fn finalize(&self, decision_id: &DecisionId) -> OpsgateResult<()>;
}

/// Resolves a target entity value against a live inventory.
///
/// `"windows"` may resolve to every Windows host; a concrete hostname
/// resolves to itself. An empty result means nothing matched.
pub trait InventoryResolver: Send + Sync {
    fn resolve(&self, target: &str) -> OpsgateResult<Vec<String>>;
}
