//! Stage C: Selection → Plan.
//!
//! One step per selected tool. Edges come from output → input references
//! and from registry ordering constraints; the steps are then sorted
//! topologically. Risky steps get pre/post checks and an explicit rollback
//! entry, which is either a compensating tool or a `NoSafeInverse` marker.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use opsgate_contracts::{
    error::{OpsgateError, OpsgateResult},
    ids::{CorrelationId, PlanId, StepId},
    intent::{EntityType, RiskLevel},
    plan::{CheckKind, CheckPhase, ParameterValue, Plan, PlanStep, RollbackStep, SafetyCheck},
    selection::Selection,
    tool::Tool,
    CONTRACT_VERSION,
};
use opsgate_registry::{may_share_target, ToolRegistry};

use crate::traits::InventoryResolver;

pub struct Planner {
    registry: Arc<ToolRegistry>,
    inventory: Option<Arc<dyn InventoryResolver>>,
    default_step_timeout_secs: u64,
}

impl Planner {
    pub fn new(registry: Arc<ToolRegistry>, default_step_timeout_secs: u64) -> Self {
        Self { registry, inventory: None, default_step_timeout_secs }
    }

    /// Resolve group targets through `inventory` before planning.
    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryResolver>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Build a Plan, consuming the Selection.
    pub fn plan(&self, selection: Selection) -> OpsgateResult<Plan> {
        selection.validate()?;

        let tools: Vec<&Tool> = selection
            .selected_tools
            .iter()
            .map(|name| {
                self.registry.get(name).ok_or_else(|| OpsgateError::Validation {
                    reason: format!("selection {} names unknown tool '{name}'", selection.selection_id),
                })
            })
            .collect::<OpsgateResult<_>>()?;

        let targets = self.resolve_targets(&selection.targets)?;
        let correlation_id = CorrelationId::new();

        let mut steps: Vec<PlanStep> = Vec::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            let step = self.build_step(i, tool, &tools, &steps, &selection, &targets, correlation_id);
            steps.push(step);
        }

        self.add_ordering_edges(&tools, &mut steps);

        let order = topological_order(&steps).map_err(|stuck| {
            error!(
                selection_id = %selection.selection_id,
                steps = ?stuck,
                "step graph has a cycle; check tool ordering metadata"
            );
            OpsgateError::CyclicDependency { steps: stuck }
        })?;

        let tools_by_step: BTreeMap<StepId, &Tool> =
            steps.iter().zip(&tools).map(|(s, t)| (s.step_id.clone(), *t)).collect();
        let mut sorted: Vec<PlanStep> = Vec::with_capacity(steps.len());
        let mut slots: Vec<Option<PlanStep>> = steps.into_iter().map(Some).collect();
        for i in order {
            if let Some(step) = slots[i].take() {
                sorted.push(step);
            }
        }

        let dag = build_dag(&sorted);
        check_exclusive_claims(&sorted, &tools_by_step, &dag)?;

        let (safety_checks, rollback_steps) = self.plan_safety(&sorted, &tools_by_step, &selection)?;

        let plan = Plan {
            schema_version: CONTRACT_VERSION,
            plan_id: PlanId::new(),
            selection_id: selection.selection_id,
            decision_id: selection.decision_id,
            correlation_id,
            steps: sorted,
            dag,
            safety_checks,
            rollback_steps,
            execution_policy: selection.execution_policy,
            created_at: Utc::now(),
        };

        info!(
            decision_id = %plan.decision_id,
            selection_id = %plan.selection_id,
            plan_id = %plan.plan_id,
            correlation_id = %plan.correlation_id,
            steps = plan.steps.len(),
            rollbacks = plan.rollback_steps.len(),
            "plan built"
        );
        Ok(plan)
    }

    fn resolve_targets(&self, targets: &[String]) -> OpsgateResult<Vec<String>> {
        let Some(inventory) = &self.inventory else {
            return Ok(targets.to_vec());
        };
        let mut resolved: Vec<String> = Vec::new();
        for target in targets {
            let hosts = inventory.resolve(target)?;
            if hosts.is_empty() {
                return Err(OpsgateError::UnplannableSelection {
                    reason: format!("target '{target}' matches no host in the inventory"),
                });
            }
            debug!(target = %target, hosts = hosts.len(), "resolved target");
            for host in hosts {
                if !resolved.contains(&host) {
                    resolved.push(host);
                }
            }
        }
        Ok(resolved)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_step(
        &self,
        index: usize,
        tool: &Tool,
        tools: &[&Tool],
        earlier: &[PlanStep],
        selection: &Selection,
        targets: &[String],
        correlation_id: CorrelationId,
    ) -> PlanStep {
        let bound = selection.bound_inputs.get(&tool.name);
        let mut parameters = BTreeMap::new();
        let mut depends_on = BTreeSet::new();

        for (name, spec) in &tool.input_schema {
            let value = if spec.kind == EntityType::Hostname && self.inventory.is_some() && !targets.is_empty() {
                Some(ParameterValue::Literal { value: one_or_many(targets) })
            } else if let Some(value) = bound.and_then(|b| b.get(name)) {
                Some(ParameterValue::Literal { value: value.clone() })
            } else if let Some(producer) = (0..index).rev().find(|&j| tools[j].outputs.contains(name)) {
                let step_id = earlier[producer].step_id.clone();
                depends_on.insert(step_id.clone());
                Some(ParameterValue::StepOutput { step_id, output: name.clone() })
            } else if spec.required {
                Some(ParameterValue::Placeholder { parameter: name.clone() })
            } else {
                None
            };
            if let Some(value) = value {
                parameters.insert(name.clone(), value);
            }
        }

        let takes_target = tool.input_schema.values().any(|spec| spec.kind.is_target());
        PlanStep {
            step_id: StepId::nth(index + 1),
            tool_name: tool.name.clone(),
            parameters,
            depends_on,
            targets: if takes_target { targets.to_vec() } else { Vec::new() },
            timeout_secs: tool.timeout_secs.unwrap_or(self.default_step_timeout_secs),
            correlation_id,
        }
    }

    fn add_ordering_edges(&self, tools: &[&Tool], steps: &mut [PlanStep]) {
        for i in 0..steps.len() {
            for j in (i + 1)..steps.len() {
                let edges: Vec<(usize, usize)> = self
                    .registry
                    .ordering_between(&tools[i].name, &tools[j].name)
                    .filter(|c| c.applies(&steps[i].targets, &steps[j].targets))
                    .map(|c| if c.before == tools[i].name { (i, j) } else { (j, i) })
                    .collect();
                for (before, after) in edges {
                    let dep = steps[before].step_id.clone();
                    steps[after].depends_on.insert(dep);
                }
            }
        }
    }

    fn plan_safety(
        &self,
        steps: &[PlanStep],
        tools: &BTreeMap<StepId, &Tool>,
        selection: &Selection,
    ) -> OpsgateResult<(Vec<SafetyCheck>, BTreeMap<StepId, RollbackStep>)> {
        let policy = &selection.execution_policy;
        let mut checks = Vec::new();
        let mut rollbacks = BTreeMap::new();

        for step in steps {
            let Some(tool) = tools.get(&step.step_id) else { continue };
            let check = |phase, kind, description: String| SafetyCheck {
                step_id: step.step_id.clone(),
                phase,
                kind,
                description,
            };

            if step.parameters.values().any(|v| matches!(v, ParameterValue::Placeholder { .. })) {
                checks.push(check(
                    CheckPhase::Pre,
                    CheckKind::InputsProvided,
                    format!("all placeholder parameters of {} are filled", step.step_id),
                ));
            }

            let risky = !tool.is_production_safe || policy.risk_tier >= RiskLevel::High;
            if !risky {
                continue;
            }

            if !step.targets.is_empty() {
                checks.push(check(
                    CheckPhase::Pre,
                    CheckKind::TargetReachable,
                    format!("{} reachable before {}", step.targets.join(", "), tool.name),
                ));
            }
            if policy.requires_approval {
                let approver = policy.approver_role.as_deref().unwrap_or("an operator");
                checks.push(check(
                    CheckPhase::Pre,
                    CheckKind::ApprovalGranted,
                    format!("{approver} approved {} at {} risk", tool.name, policy.risk_tier),
                ));
            }
            checks.push(check(
                CheckPhase::Post,
                CheckKind::PostconditionVerified,
                format!("effect of {} confirmed on its targets", tool.name),
            ));

            rollbacks.insert(step.step_id.clone(), self.rollback_for(step, tool)?);
        }
        Ok((checks, rollbacks))
    }

    fn rollback_for(&self, step: &PlanStep, tool: &Tool) -> OpsgateResult<RollbackStep> {
        let Some(compensation) = &tool.compensation else {
            return Ok(RollbackStep::NoSafeInverse {
                reason: format!("'{}' declares no compensating action", tool.name),
            });
        };
        let inverse = self.registry.get(&compensation.tool).ok_or_else(|| {
            OpsgateError::UnplannableSelection {
                reason: format!(
                    "'{}' compensates with unknown tool '{}'",
                    tool.name, compensation.tool
                ),
            }
        })?;

        let mut parameters: BTreeMap<String, ParameterValue> = step
            .parameters
            .iter()
            .filter(|(name, _)| inverse.input_schema.contains_key(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for (name, value) in &compensation.parameters {
            parameters.insert(name.clone(), ParameterValue::Literal { value: value.clone() });
        }
        Ok(RollbackStep::Compensate { tool_name: inverse.name.clone(), parameters })
    }
}

fn one_or_many(values: &[String]) -> Value {
    match values {
        [single] => Value::String(single.clone()),
        _ => json!(values),
    }
}

/// Kahn's algorithm over step indices, lowest index first among ready
/// steps. On a cycle, returns the ids of the steps that never became ready.
fn topological_order(steps: &[PlanStep]) -> Result<Vec<usize>, Vec<String>> {
    let index: BTreeMap<&StepId, usize> = steps.iter().enumerate().map(|(i, s)| (&s.step_id, i)).collect();
    let mut indegree: Vec<usize> = steps.iter().map(|s| s.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            if let Some(&d) = index.get(dep) {
                dependents[d].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..steps.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() == steps.len() {
        Ok(order)
    } else {
        Err(steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !order.contains(i))
            .map(|(_, s)| s.step_id.to_string())
            .collect())
    }
}

/// step → steps that depend on it. Every step is a key.
fn build_dag(steps: &[PlanStep]) -> BTreeMap<StepId, BTreeSet<StepId>> {
    let mut dag: BTreeMap<StepId, BTreeSet<StepId>> =
        steps.iter().map(|s| (s.step_id.clone(), BTreeSet::new())).collect();
    for step in steps {
        for dep in &step.depends_on {
            if let Some(dependents) = dag.get_mut(dep) {
                dependents.insert(step.step_id.clone());
            }
        }
    }
    dag
}

fn reaches(dag: &BTreeMap<StepId, BTreeSet<StepId>>, from: &StepId, to: &StepId) -> bool {
    let mut stack = vec![from];
    let mut seen = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = dag.get(current) {
            stack.extend(next.iter());
        }
    }
    false
}

/// Two steps claiming exclusive access to a shared target must be ordered.
/// Unresolved targets count as shared.
fn check_exclusive_claims(
    steps: &[PlanStep],
    tools: &BTreeMap<StepId, &Tool>,
    dag: &BTreeMap<StepId, BTreeSet<StepId>>,
) -> OpsgateResult<()> {
    let exclusive: Vec<&PlanStep> = steps
        .iter()
        .filter(|s| tools.get(&s.step_id).map_or(false, |t| t.exclusive_target))
        .collect();
    for (i, a) in exclusive.iter().enumerate() {
        for b in &exclusive[i + 1..] {
            if !may_share_target(&a.targets, &b.targets) {
                continue;
            }
            let shared = a
                .targets
                .iter()
                .find(|t| b.targets.contains(t))
                .map_or_else(|| "an unresolved target".to_string(), |t| format!("'{t}'"));
            if !reaches(dag, &a.step_id, &b.step_id) && !reaches(dag, &b.step_id, &a.step_id) {
                return Err(OpsgateError::UnplannableSelection {
                    reason: format!(
                        "{} ({}) and {} ({}) both claim exclusive access to {shared} with no ordering",
                        a.step_id, a.tool_name, b.step_id, b.tool_name
                    ),
                });
            }
        }
    }
    Ok(())
}
