//! Error taxonomy for the opsgate pipeline.
//!
//! Every stage returns `OpsgateResult<T>`. Variants carry enough context for
//! the caller to surface a specific reason instead of a generic failure.

use thiserror::Error;

/// The unified error type for the request-to-plan pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpsgateError {
    /// The reasoning backend could not be reached, timed out, or returned a
    /// response that failed structural or semantic verification.
    ///
    /// Fatal to the current call. Never retried at this layer.
    #[error("reasoning backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// No registered tool offers a capability the intent category requires.
    #[error("cannot fulfill request: no tool offers a capability required for '{category}' / '{action}'")]
    NoCandidateTool { category: String, action: String },

    /// The generated step graph contains a cycle. Always a catalog bug.
    #[error("cyclic step dependency among: {}", .steps.join(", "))]
    CyclicDependency { steps: Vec<String> },

    /// The selection cannot be turned into a consistent plan.
    #[error("unplannable selection: {reason}")]
    UnplannableSelection { reason: String },

    /// A Decision or Selection handed to a later stage violates its contract.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// A tool with this name is already registered.
    #[error("duplicate tool '{name}' in registry")]
    DuplicateTool { name: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The audit writer could not persist a record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

impl OpsgateError {
    /// Stable snake_case tag for logs and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            OpsgateError::BackendUnavailable { .. } => "backend_unavailable",
            OpsgateError::NoCandidateTool { .. } => "no_candidate_tool",
            OpsgateError::CyclicDependency { .. } => "cyclic_dependency",
            OpsgateError::UnplannableSelection { .. } => "unplannable_selection",
            OpsgateError::Validation { .. } => "validation",
            OpsgateError::DuplicateTool { .. } => "duplicate_tool",
            OpsgateError::ConfigError { .. } => "config_error",
            OpsgateError::AuditWriteFailed { .. } => "audit_write_failed",
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        OpsgateError::Validation { reason: reason.into() }
    }
}

/// Convenience alias used throughout the opsgate crates.
pub type OpsgateResult<T> = Result<T, OpsgateError>;
