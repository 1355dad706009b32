//! Audit records.
//!
//! Each finalized Decision, Selection, and Plan is written exactly once to
//! an append-only log keyed by `decision_id`. Records are never modified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{decision::Decision, ids::DecisionId, plan::Plan, selection::Selection};

/// Which stage produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Decision,
    Selection,
    Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "artifact", rename_all = "snake_case")]
pub enum AuditPayload {
    Decision(Decision),
    Selection(Selection),
    Plan(Plan),
}

/// One immutable entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub decision_id: DecisionId,
    pub payload: AuditPayload,
    /// Wall-clock time the record was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn decision(decision: &Decision) -> Self {
        Self {
            decision_id: decision.decision_id,
            payload: AuditPayload::Decision(decision.clone()),
            timestamp: Utc::now(),
        }
    }

    pub fn selection(selection: &Selection) -> Self {
        Self {
            decision_id: selection.decision_id,
            payload: AuditPayload::Selection(selection.clone()),
            timestamp: Utc::now(),
        }
    }

    pub fn plan(plan: &Plan) -> Self {
        Self {
            decision_id: plan.decision_id,
            payload: AuditPayload::Plan(plan.clone()),
            timestamp: Utc::now(),
        }
    }

    pub fn stage(&self) -> AuditStage {
        match self.payload {
            AuditPayload::Decision(_) => AuditStage::Decision,
            AuditPayload::Selection(_) => AuditStage::Selection,
            AuditPayload::Plan(_) => AuditStage::Plan,
        }
    }
}
