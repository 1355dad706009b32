//! Reasoning backend request and response-verification types.
//!
//! The backend is untrusted. Every response is checked against a
//! `ResponseSchema` before any stage reads it: a JSON Schema document for
//! structure plus semantic rules JSON Schema cannot express. Only a passing
//! `VerificationReport` lets the response through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the backend is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTask {
    /// Stage A: classify a request into intent, entities, and risk.
    Classify,
    /// Stage B: pick one tool among near-tied or low-scoring candidates.
    SelectTool,
}

impl BackendTask {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendTask::Classify => "classify",
            BackendTask::SelectTool => "select_tool",
        }
    }
}

/// One call to the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    pub task: BackendTask,
    /// The text the backend reasons about (request text or a rendered prompt).
    pub input: String,
    /// Structured context: few-shot examples, candidates, decision summary.
    pub context: Value,
    /// The shape the response must have. Sent to the backend as a hint and
    /// enforced on the way back.
    pub schema: ResponseSchema,
}

/// The full specification a backend response is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Unique identifier, e.g. "classify-v1".
    pub schema_id: String,
    /// JSON Schema document used for structural validation.
    pub json_schema: Value,
    /// Additional rules evaluated after structural validation.
    pub rules: Vec<ResponseRule>,
}

/// A single semantic rule applied to a backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Referenced in failure reports.
    pub rule_id: String,
    pub description: String,
    pub rule_type: ResponseRuleType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseRuleType {
    /// The field at `field_path` must be present and non-null.
    RequiredField {
        /// Dotted path, e.g. "intent.category".
        field_path: String,
    },

    /// The field at `field_path` must equal one of `allowed`.
    AllowedValues { field_path: String, allowed: Vec<Value> },

    /// The numeric field at `field_path` must lie in `[min, max]`.
    NumberRange { field_path: String, min: f64, max: f64 },

    /// Delegate to a function registered with the verifier by name.
    Custom { function_name: String },
}

/// The result of checking one response against a `ResponseSchema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True only if every check passed.
    pub passed: bool,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    pub fn pass() -> Self {
        Self { passed: true, failures: Vec::new() }
    }

    /// One line per failure, `[rule] message`, joined with `; `.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub rule_id: String,
    pub message: String,
}
