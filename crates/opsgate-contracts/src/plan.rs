//! The Stage C output contract consumed by the execution engine.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{CorrelationId, DecisionId, PlanId, SelectionId, StepId},
    selection::ExecutionPolicy,
};

/// The value of one step parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Known at planning time.
    Literal { value: serde_json::Value },
    /// Must be filled by the caller before execution.
    Placeholder { parameter: String },
    /// Produced by an earlier step at run time.
    StepOutput { step_id: StepId, output: String },
}

/// One tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: StepId,
    pub tool_name: String,
    pub parameters: BTreeMap<String, ParameterValue>,
    pub depends_on: BTreeSet<StepId>,
    /// Concrete targets after inventory resolution.
    pub targets: Vec<String>,
    pub timeout_secs: u64,
    pub correlation_id: CorrelationId,
}

/// When a safety check runs relative to its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Every target answers before the step runs.
    TargetReachable,
    /// A human with the policy's approver role signed off.
    ApprovalGranted,
    /// Every placeholder parameter has been filled.
    InputsProvided,
    /// The step's intended effect is observable afterwards.
    PostconditionVerified,
}

/// A pre- or post-condition assertion attached to a risky step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub step_id: StepId,
    pub phase: CheckPhase,
    pub kind: CheckKind,
    pub description: String,
}

/// The compensating action for a risky step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollbackStep {
    /// Run `tool_name` with `parameters` to undo the step.
    Compensate {
        tool_name: String,
        parameters: BTreeMap<String, ParameterValue>,
    },
    /// Explicit marker: no safe inverse exists for this step.
    NoSafeInverse { reason: String },
}

/// A dependency-ordered, fully specified execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub schema_version: u32,
    pub plan_id: PlanId,
    /// Back-reference to the Selection this plan was built from.
    pub selection_id: SelectionId,
    /// Carried through from the Selection for end-to-end lineage.
    pub decision_id: DecisionId,
    pub correlation_id: CorrelationId,
    /// Steps in a topological order of `dag`.
    pub steps: Vec<PlanStep>,
    /// step → steps that depend on it. Acyclic.
    pub dag: BTreeMap<StepId, BTreeSet<StepId>>,
    pub safety_checks: Vec<SafetyCheck>,
    pub rollback_steps: BTreeMap<StepId, RollbackStep>,
    pub execution_policy: ExecutionPolicy,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn step(&self, step_id: &StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.step_id == step_id)
    }

    /// Parameter names the caller must fill before execution.
    pub fn required_inputs(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|s| s.parameters.values())
            .filter_map(|v| match v {
                ParameterValue::Placeholder { parameter } => Some(parameter.clone()),
                _ => None,
            })
            .collect()
    }

    /// Group steps into waves: every step in wave `n` depends only on steps
    /// in earlier waves, so a wave may run concurrently.
    ///
    /// Relies on `steps` being topologically ordered.
    pub fn execution_waves(&self) -> Vec<Vec<StepId>> {
        let mut level: HashMap<&StepId, usize> = HashMap::new();
        let mut waves: Vec<Vec<StepId>> = Vec::new();
        for step in &self.steps {
            let wave = step
                .depends_on
                .iter()
                .filter_map(|dep| level.get(dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(&step.step_id, wave);
            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            waves[wave].push(step.step_id.clone());
        }
        waves
    }
}
