//! Schema-based response verifier.
//!
//! `SchemaVerifier` implements the `ResponseVerifier` trait from
//! `opsgate-core`. Verification runs in two phases:
//!
//! 1. **Structural**: the response is validated against
//!    `ResponseSchema::json_schema` using the `jsonschema` crate.
//! 2. **Semantic**: each `ResponseRule` in `ResponseSchema::rules` is
//!    evaluated in order. All failures are collected before returning so the
//!    gateway can report the full failure set in one error.
//!
//! Custom rules delegate to named functions registered via `register_rule`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use opsgate_contracts::{
    backend::{ResponseRuleType, ResponseSchema, VerificationFailure, VerificationReport},
    error::OpsgateResult,
};
use opsgate_core::traits::ResponseVerifier;

/// A caller-supplied verification function.
///
/// Receives the full backend response. Returns `Some(message)` when the
/// check fails, or `None` on success.
pub type CustomVerifierFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// JSON Schema structural validation plus a set of semantic rules.
pub struct SchemaVerifier {
    custom_rules: HashMap<String, CustomVerifierFn>,
}

impl SchemaVerifier {
    pub fn new() -> Self {
        Self { custom_rules: HashMap::new() }
    }

    /// Register a custom verification function under `name`.
    ///
    /// The name must match the `function_name` of a
    /// `ResponseRuleType::Custom` rule. Registering the same name twice
    /// replaces the previous function.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomVerifierFn) {
        self.custom_rules.insert(name.into(), f);
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Resolve a dotted path (e.g. `"intent.category"`) against a JSON value.
    /// `None` when any segment is missing or the value is JSON `null`.
    /// Numeric segments index into arrays.
    fn resolve_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
        let mut current = value;
        for segment in path.split('.') {
            let next = match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => current.get(segment),
            };
            match next {
                Some(v) if !v.is_null() => current = v,
                _ => return None,
            }
        }
        Some(current)
    }

    fn check_rule(&self, rule_type: &ResponseRuleType, response: &Value) -> Option<String> {
        match rule_type {
            ResponseRuleType::RequiredField { field_path } => Self::resolve_path(response, field_path)
                .is_none()
                .then(|| format!("required field '{field_path}' is missing or null")),

            ResponseRuleType::AllowedValues { field_path, allowed } => {
                match Self::resolve_path(response, field_path) {
                    None => Some(format!("field '{field_path}' is missing; cannot check allowed values")),
                    Some(actual) if allowed.contains(actual) => None,
                    Some(actual) => Some(format!(
                        "field '{field_path}' has value {actual} which is not in the allowed set"
                    )),
                }
            }

            // An absent field is left to RequiredField.
            ResponseRuleType::NumberRange { field_path, min, max } => {
                match Self::resolve_path(response, field_path) {
                    None => None,
                    Some(v) => match v.as_f64() {
                        Some(n) if n >= *min && n <= *max => None,
                        Some(n) => Some(format!("field '{field_path}' is {n}, outside [{min}, {max}]")),
                        None => Some(format!("field '{field_path}' is not a number: {v}")),
                    },
                }
            }

            // An unregistered name is itself a failure.
            ResponseRuleType::Custom { function_name } => match self.custom_rules.get(function_name.as_str()) {
                Some(f) => f(response),
                None => Some(format!("no custom rule registered for function name '{function_name}'")),
            },
        }
    }
}

impl Default for SchemaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseVerifier for SchemaVerifier {
    /// Verify `response` against `schema`, accumulating every failure.
    fn verify(&self, response: &Value, schema: &ResponseSchema) -> OpsgateResult<VerificationReport> {
        let mut failures: Vec<VerificationFailure> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        // A null json_schema means no structural constraint.
        if !schema.json_schema.is_null() {
            match jsonschema::validator_for(&schema.json_schema) {
                Ok(validator) => {
                    for error in validator.iter_errors(response) {
                        let message = format!("JSON Schema violation at {}: {}", error.instance_path, error);
                        warn!(schema_id = %schema.schema_id, %message, "structural validation failure");
                        failures.push(VerificationFailure { rule_id: "json-schema".to_string(), message });
                    }
                }
                Err(e) => {
                    let message = format!("invalid JSON Schema document: {e}");
                    warn!(schema_id = %schema.schema_id, %message, "schema compilation failure");
                    failures.push(VerificationFailure { rule_id: "json-schema".to_string(), message });
                }
            }
        }

        // ── Phase 2: Semantic rule evaluation ────────────────────────────────
        for rule in &schema.rules {
            debug!(rule_id = %rule.rule_id, description = %rule.description, "evaluating response rule");
            if let Some(message) = self.check_rule(&rule.rule_type, response) {
                warn!(rule_id = %rule.rule_id, %message, "response rule failed");
                failures.push(VerificationFailure { rule_id: rule.rule_id.clone(), message });
            }
        }

        let passed = failures.is_empty();
        debug!(
            schema_id = %schema.schema_id,
            passed,
            failure_count = failures.len(),
            "verification complete"
        );

        Ok(VerificationReport { passed, failures })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
