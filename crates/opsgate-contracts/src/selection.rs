//! The Stage B output contract.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{OpsgateError, OpsgateResult},
    ids::{DecisionId, SelectionId},
    intent::{DecisionType, RiskLevel},
    CONTRACT_VERSION,
};

/// How the execution engine must treat the selected tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    pub requires_approval: bool,
    pub parallelizable: bool,
    pub risk_tier: RiskLevel,
    /// Role that must sign off when `requires_approval` is set.
    pub approver_role: Option<String>,
}

impl ExecutionPolicy {
    /// Combine the policies of two tools in one selection.
    ///
    /// Approval is required if either needs it, parallelism only if both
    /// allow it, and the tier is the higher of the two.
    pub fn merge(self, other: ExecutionPolicy) -> ExecutionPolicy {
        let (approver_role, risk_tier) = if other.risk_tier > self.risk_tier {
            (other.approver_role.or(self.approver_role), other.risk_tier)
        } else {
            (self.approver_role.or(other.approver_role), self.risk_tier)
        };
        ExecutionPolicy {
            requires_approval: self.requires_approval || other.requires_approval,
            parallelizable: self.parallelizable && other.parallelizable,
            risk_tier,
            approver_role,
        }
    }
}

/// Chosen tool(s) and policy for one Decision. Created once, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub schema_version: u32,
    pub selection_id: SelectionId,
    /// Back-reference to the Decision this selection was built from.
    pub decision_id: DecisionId,
    pub decision_type: DecisionType,
    /// Tool names in execution-intent order.
    pub selected_tools: Vec<String>,
    pub execution_policy: ExecutionPolicy,
    /// Required parameters that no entity could fill.
    pub additional_inputs_needed: BTreeSet<String>,
    /// tool name → parameter name → value derived from the Decision's entities.
    pub bound_inputs: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    /// Target entity values (hosts, addresses, OS families) in request order.
    pub targets: Vec<String>,
    pub justification: String,
    pub selection_confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl Selection {
    /// Check the contract the planner relies on.
    pub fn validate(&self) -> OpsgateResult<()> {
        if self.schema_version != CONTRACT_VERSION {
            return Err(OpsgateError::validation(format!(
                "selection {} has schema version {}, expected {}",
                self.selection_id, self.schema_version, CONTRACT_VERSION
            )));
        }
        if self.selected_tools.is_empty() {
            return Err(OpsgateError::validation(format!(
                "selection {} names no tools",
                self.selection_id
            )));
        }
        let confidence = self.selection_confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(OpsgateError::validation(format!(
                "selection {} has confidence {confidence} outside [0, 1]",
                self.selection_id
            )));
        }
        let mut seen = BTreeSet::new();
        for tool in &self.selected_tools {
            if !seen.insert(tool.as_str()) {
                return Err(OpsgateError::validation(format!(
                    "selection {} names tool '{tool}' twice",
                    self.selection_id
                )));
            }
        }
        Ok(())
    }
}
