//! Stage A: request text → Decision.
//!
//! The backend is required. A timeout, transport error, or malformed
//! response fails the call with `BackendUnavailable`; there is no
//! heuristic-only mode.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use opsgate_contracts::{
    backend::{BackendRequest, BackendTask, ResponseRule, ResponseRuleType, ResponseSchema},
    decision::{Decision, RequestContext},
    error::{OpsgateError, OpsgateResult},
    ids::DecisionId,
    intent::{Entity, EntitySource, EntityType, Intent, IntentCategory, RiskLevel},
    CONTRACT_VERSION,
};

use crate::{
    entities,
    gateway::BackendGateway,
    scoring::{self, RiskSignals},
};

pub const CLASSIFY_SCHEMA_ID: &str = "opsgate.classify.v1";

/// Few-shot patterns sent with every classification request.
const FEW_SHOT: &[(&str, &str, &str)] = &[
    ("Show me all assets", "asset_management", "list"),
    ("Stop the nginx service on web-01", "service_management", "stop"),
    ("What is the CPU usage on db-02?", "monitoring", "show"),
    ("Can web-03 reach 10.0.0.5 on port 443?", "network_diagnostics", "ping"),
    ("Read /etc/hosts on app-01", "file_operations", "read"),
    ("Run the cleanup script on all linux hosts", "automation", "run"),
    ("Why is checkout failing on prod-web-01?", "troubleshooting", "investigate"),
];

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    category: IntentCategory,
    action: String,
    confidence: f64,
    #[serde(default)]
    entities: Vec<BackendEntity>,
    #[serde(default)]
    risk: RiskLevel,
    #[serde(default)]
    read_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BackendEntity {
    #[serde(rename = "type")]
    entity_type: EntityType,
    value: String,
    #[serde(default = "default_entity_confidence")]
    confidence: f64,
}

fn default_entity_confidence() -> f64 {
    0.8
}

/// The response contract a classify call must satisfy.
pub fn classify_schema() -> ResponseSchema {
    let categories: Vec<Value> = IntentCategory::ALL.iter().map(|c| json!(c.as_str())).collect();
    ResponseSchema {
        schema_id: CLASSIFY_SCHEMA_ID.to_string(),
        json_schema: json!({
            "type": "object",
            "required": ["category", "action", "confidence"],
            "properties": {
                "category": { "type": "string" },
                "action": { "type": "string", "minLength": 1 },
                "confidence": { "type": "number" },
                "risk": { "enum": ["low", "medium", "high", "critical"] },
                "read_only": { "type": "boolean" },
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["type", "value"],
                        "properties": {
                            "type": { "type": "string" },
                            "value": { "type": "string" },
                            "confidence": { "type": "number" }
                        }
                    }
                }
            }
        }),
        rules: vec![
            ResponseRule {
                rule_id: "classify-category-required".to_string(),
                description: "category must be present".to_string(),
                rule_type: ResponseRuleType::RequiredField { field_path: "category".to_string() },
            },
            ResponseRule {
                rule_id: "classify-category-known".to_string(),
                description: "category must be a known intent category".to_string(),
                rule_type: ResponseRuleType::AllowedValues {
                    field_path: "category".to_string(),
                    allowed: categories,
                },
            },
            ResponseRule {
                rule_id: "classify-confidence-range".to_string(),
                description: "confidence must lie in [0, 1]".to_string(),
                rule_type: ResponseRuleType::NumberRange {
                    field_path: "confidence".to_string(),
                    min: 0.0,
                    max: 1.0,
                },
            },
        ],
    }
}

pub struct Classifier {
    gateway: Arc<BackendGateway>,
}

impl Classifier {
    pub fn new(gateway: Arc<BackendGateway>) -> Self {
        Self { gateway }
    }

    /// Classify one request.
    ///
    /// Fails with `Validation` on empty text and `BackendUnavailable` on any
    /// backend failure. An ambiguous Decision is a success.
    pub async fn classify(&self, request_text: &str, context: &RequestContext) -> OpsgateResult<Decision> {
        let text = request_text.trim();
        if text.is_empty() {
            return Err(OpsgateError::Validation { reason: "request text is empty".to_string() });
        }

        let request = BackendRequest {
            task: BackendTask::Classify,
            input: text.to_string(),
            context: backend_context(context),
            schema: classify_schema(),
        };
        let response: ClassifyResponse = self.gateway.call_as(&request).await?;

        let action = response.action.trim().to_lowercase();
        if action.is_empty() {
            return Err(OpsgateError::BackendUnavailable {
                reason: format!("malformed classify response (schema '{CLASSIFY_SCHEMA_ID}'): empty action"),
            });
        }

        let backend_entities: Vec<Entity> = response
            .entities
            .into_iter()
            .map(|e| {
                entities::normalize_backend(
                    text,
                    Entity {
                        entity_type: e.entity_type,
                        value: e.value,
                        confidence: e.confidence,
                        source: EntitySource::Backend,
                        span: None,
                    },
                )
            })
            .collect();
        let merged = entities::merge(
            backend_entities,
            entities::extract(text),
            entities::from_context(context),
        );

        let coverage = scoring::entity_coverage(response.category, &merged);
        let clarity = scoring::request_clarity(text);
        let confidence = scoring::combined_confidence(response.confidence, coverage, clarity);

        let signals = RiskSignals::collect(text, &merged, &action);
        let risk_level = scoring::combine_risk(scoring::rule_risk(signals), response.risk);
        let decision_type = scoring::decision_type(confidence, &action, response.read_only);

        let decision = Decision {
            schema_version: CONTRACT_VERSION,
            decision_id: DecisionId::new(),
            request_text: text.to_string(),
            intent: Intent { category: response.category, action, confidence },
            entities: merged,
            risk_level,
            decision_type,
            created_at: Utc::now(),
        };
        decision.validate()?;

        info!(
            decision_id = %decision.decision_id,
            category = %decision.intent.category,
            action = %decision.intent.action,
            confidence = decision.intent.confidence,
            risk = %decision.risk_level,
            decision_type = ?decision.decision_type,
            entities = decision.entities.len(),
            "request classified"
        );
        Ok(decision)
    }

    /// Classify independent requests concurrently.
    ///
    /// One result per input, in input order. A failure affects only its
    /// own slot.
    pub async fn classify_batch(
        &self,
        texts: &[String],
        context: &RequestContext,
    ) -> Vec<OpsgateResult<Decision>> {
        join_all(texts.iter().map(|text| self.classify(text, context))).await
    }
}

fn backend_context(context: &RequestContext) -> Value {
    let examples: Vec<Value> = FEW_SHOT
        .iter()
        .map(|(text, category, action)| json!({ "text": text, "category": category, "action": action }))
        .collect();
    let entity_types = [
        EntityType::Hostname,
        EntityType::IpAddress,
        EntityType::Port,
        EntityType::FilePath,
        EntityType::Environment,
        EntityType::OsFamily,
        EntityType::Service,
        EntityType::CommandVerb,
    ];
    json!({
        "categories": IntentCategory::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        "entity_types": entity_types.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        "examples": examples,
        "requester": context.requester,
        "default_environment": context.default_environment,
        "metadata": context.metadata,
    })
}
