//! Tool catalog entries.
//!
//! A `Tool` is immutable once registered. Catalogs are written in TOML; see
//! `opsgate-registry` for the loader.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{capability::CapabilitySet, intent::EntityType};

/// Declared input parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(default)]
    pub required: bool,
    /// The entity type this parameter accepts.
    #[serde(rename = "type")]
    pub kind: EntityType,
}

/// How to undo a tool's effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    /// The tool that reverses the effect, run with the original parameters.
    pub tool: String,
    /// Parameters overriding the original ones (e.g. `action = "start"`).
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// A registered, executable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique registry key.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub required_permissions: BTreeSet<String>,
    /// False for tools that may change production state.
    #[serde(default)]
    pub is_production_safe: bool,
    /// Escalates the execution policy's risk tier when selected.
    #[serde(default)]
    pub high_impact: bool,
    /// Verbs this tool serves. Empty means any verb.
    #[serde(default)]
    pub actions: BTreeSet<String>,
    #[serde(default)]
    pub input_schema: BTreeMap<String, ParamSpec>,
    /// Named outputs later steps may consume as inputs.
    #[serde(default)]
    pub outputs: BTreeSet<String>,
    /// The tool claims exclusive write access to each target it runs on.
    #[serde(default)]
    pub exclusive_target: bool,
    #[serde(default)]
    pub compensation: Option<Compensation>,
    /// Per-step timeout. Falls back to the planner default when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Tool {
    /// Names of parameters marked `required`, in name order.
    pub fn required_params(&self) -> impl Iterator<Item = (&str, &ParamSpec)> + '_ {
        self.input_schema
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// True if some input parameter accepts values of `kind`.
    pub fn accepts(&self, kind: EntityType) -> bool {
        self.input_schema.values().any(|spec| spec.kind == kind)
    }

    /// True if the tool serves `action` (or declares no verb restriction).
    pub fn serves_action(&self, action: &str) -> bool {
        self.actions.is_empty() || self.actions.contains(action)
    }
}
