//! Catalog schema: the TOML document a registry is loaded from.
//!
//! Example:
//! ```toml
//! [[tools]]
//! name = "service_stop"
//! capabilities = ["service_control"]
//! actions = ["stop"]
//! exclusive_target = true
//! compensation = { tool = "service_start" }
//!
//! [tools.input_schema.host]
//! required = true
//! type = "hostname"
//!
//! [[ordering]]
//! before = "service_stop"
//! after = "service_start"
//! scope = "same_target"
//!
//! [[composites]]
//! action = "restart"
//! sequence = ["stop", "start"]
//! ```

use serde::{Deserialize, Serialize};

use opsgate_contracts::tool::Tool;

/// Whether an ordering constraint applies only when both steps share a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingScope {
    /// Applies when the two steps have at least one target in common, or
    /// either step's targets are still unresolved.
    #[default]
    SameTarget,
    /// Applies whenever both tools appear in the same plan.
    Global,
}

/// `before` must run before `after` when both appear in one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingConstraint {
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub scope: OrderingScope,
}

/// An action served by running other actions in sequence, e.g.
/// `restart = [stop, start]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub action: String,
    pub sequence: Vec<String>,
}

/// The top-level structure deserialized from a TOML catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Registered in declaration order; the order breaks score ties.
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub ordering: Vec<OrderingConstraint>,
    #[serde(default)]
    pub composites: Vec<CompositeAction>,
}
