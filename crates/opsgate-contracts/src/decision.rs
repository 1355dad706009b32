//! The Stage A output contract.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{OpsgateError, OpsgateResult},
    ids::DecisionId,
    intent::{DecisionType, Entity, EntityType, Intent, RiskLevel},
    CONTRACT_VERSION,
};

/// Caller-supplied context for one classification call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Who asked. Carried into the backend prompt and the audit trail.
    pub requester: Option<String>,
    /// Environment the request applies to when the text does not name one.
    pub default_environment: Option<String>,
    /// Free-form extra context passed through to the backend.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Structured classification of one request. Created once, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub schema_version: u32,
    pub decision_id: DecisionId,
    pub request_text: String,
    pub intent: Intent,
    /// Deduplicated by (type, normalized value), in first-seen order.
    pub entities: Vec<Entity>,
    pub risk_level: RiskLevel,
    pub decision_type: DecisionType,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// The distinct entity types present.
    pub fn entity_types(&self) -> BTreeSet<EntityType> {
        self.entities.iter().map(|e| e.entity_type).collect()
    }

    /// All entities of the given type, in order.
    pub fn entities_of(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().filter(move |e| e.entity_type == entity_type)
    }

    pub fn is_ambiguous(&self) -> bool {
        self.decision_type == DecisionType::Ambiguous
    }

    /// Check the contract a later stage relies on.
    pub fn validate(&self) -> OpsgateResult<()> {
        if self.schema_version != CONTRACT_VERSION {
            return Err(OpsgateError::validation(format!(
                "decision {} has schema version {}, expected {}",
                self.decision_id, self.schema_version, CONTRACT_VERSION
            )));
        }
        if self.request_text.trim().is_empty() {
            return Err(OpsgateError::validation(format!(
                "decision {} has an empty request text",
                self.decision_id
            )));
        }
        let confidence = self.intent.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(OpsgateError::validation(format!(
                "decision {} has confidence {confidence} outside [0, 1]",
                self.decision_id
            )));
        }
        if self.intent.action.trim().is_empty() {
            return Err(OpsgateError::validation(format!(
                "decision {} has an empty intent action",
                self.decision_id
            )));
        }
        Ok(())
    }
}
