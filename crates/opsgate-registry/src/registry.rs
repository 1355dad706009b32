//! The tool registry.
//!
//! Registration happens while the registry is still exclusively owned at
//! startup. Once it is shared behind an `Arc`, nothing can obtain `&mut`
//! again, so concurrent readers need no locking.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use opsgate_contracts::{
    capability::Capability,
    error::{OpsgateError, OpsgateResult},
    intent::IntentCategory,
    tool::Tool,
};

use crate::catalog::{CatalogConfig, CompositeAction, OrderingConstraint, OrderingScope};

/// Catalog of executable tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
    ordering: Vec<OrderingConstraint>,
    composites: HashMap<String, Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `s` as a TOML catalog and register everything it declares.
    ///
    /// Returns `ConfigError` for malformed TOML or dangling references and
    /// `DuplicateTool` when a name appears twice.
    pub fn from_toml_str(s: &str) -> OpsgateResult<Self> {
        let config: CatalogConfig = toml::from_str(s).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to parse tool catalog TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and load it as a TOML catalog.
    pub fn from_file(path: &Path) -> OpsgateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to read tool catalog '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: CatalogConfig) -> OpsgateResult<Self> {
        let mut registry = Self::new();
        for tool in config.tools {
            registry.register(tool)?;
        }
        for constraint in config.ordering {
            registry.register_ordering(constraint)?;
        }
        for composite in config.composites {
            registry.register_composite(composite)?;
        }
        registry.check_compensations()?;
        info!(
            tools = registry.tools.len(),
            ordering_constraints = registry.ordering.len(),
            composites = registry.composites.len(),
            "tool catalog loaded"
        );
        Ok(registry)
    }

    /// Add a tool. Fails with `DuplicateTool` if the name is taken.
    pub fn register(&mut self, tool: Tool) -> OpsgateResult<()> {
        if tool.name.trim().is_empty() {
            return Err(OpsgateError::ConfigError {
                reason: "tool name must not be empty".to_string(),
            });
        }
        if tool.capabilities.is_empty() {
            return Err(OpsgateError::ConfigError {
                reason: format!("tool '{}' declares no capabilities", tool.name),
            });
        }
        if self.index.contains_key(&tool.name) {
            return Err(OpsgateError::DuplicateTool { name: tool.name });
        }
        debug!(tool = %tool.name, capabilities = tool.capabilities.len(), "registering tool");
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Declare that `before` must precede `after`. Both tools must exist.
    pub fn register_ordering(&mut self, constraint: OrderingConstraint) -> OpsgateResult<()> {
        for name in [&constraint.before, &constraint.after] {
            if !self.index.contains_key(name) {
                return Err(OpsgateError::ConfigError {
                    reason: format!("ordering constraint references unknown tool '{name}'"),
                });
            }
        }
        self.ordering.push(constraint);
        Ok(())
    }

    pub fn register_composite(&mut self, composite: CompositeAction) -> OpsgateResult<()> {
        if composite.sequence.len() < 2 {
            return Err(OpsgateError::ConfigError {
                reason: format!(
                    "composite action '{}' must expand to at least two actions",
                    composite.action
                ),
            });
        }
        if composite.sequence.iter().any(|a| a == &composite.action) {
            return Err(OpsgateError::ConfigError {
                reason: format!("composite action '{}' expands to itself", composite.action),
            });
        }
        self.composites.insert(composite.action, composite.sequence);
        Ok(())
    }

    fn check_compensations(&self) -> OpsgateResult<()> {
        for tool in &self.tools {
            if let Some(comp) = &tool.compensation {
                if !self.index.contains_key(&comp.tool) {
                    return Err(OpsgateError::ConfigError {
                        reason: format!(
                            "tool '{}' names unknown compensation tool '{}'",
                            tool.name, comp.tool
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Registration position of `name`; lower wins score ties.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// All tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> + '_ {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools declaring `capability`, in registration order.
    pub fn find_by_capability(&self, capability: Capability) -> Vec<&Tool> {
        self.tools.iter().filter(|t| t.capabilities.has(capability)).collect()
    }

    /// Tools offering at least one capability `category` requires.
    pub fn find_by_intent(&self, category: IntentCategory) -> Vec<&Tool> {
        let required = category.required_capabilities();
        self.tools.iter().filter(|t| t.capabilities.intersects(required)).collect()
    }

    /// Keep only the production-safe tools, preserving order.
    pub fn production_safe_only<'a>(tools: impl IntoIterator<Item = &'a Tool>) -> Vec<&'a Tool> {
        tools.into_iter().filter(|t| t.is_production_safe).collect()
    }

    /// Constraints relating `a` and `b`, in either direction.
    pub fn ordering_between<'a>(
        &'a self,
        a: &'a str,
        b: &'a str,
    ) -> impl Iterator<Item = &'a OrderingConstraint> + 'a {
        self.ordering.iter().filter(move |c| {
            (c.before == a && c.after == b) || (c.before == b && c.after == a)
        })
    }

    pub fn ordering_constraints(&self) -> &[OrderingConstraint] {
        &self.ordering
    }

    /// The sub-actions `action` expands to, if it is a composite.
    pub fn composite(&self, action: &str) -> Option<&[String]> {
        self.composites.get(action).map(Vec::as_slice)
    }
}

impl OrderingConstraint {
    /// True if the constraint binds two steps with the given targets.
    ///
    /// An empty target list is not yet resolved (the host is still a
    /// placeholder) and may turn out to be any host, so it binds.
    pub fn applies(&self, targets_a: &[String], targets_b: &[String]) -> bool {
        match self.scope {
            OrderingScope::Global => true,
            OrderingScope::SameTarget => may_share_target(targets_a, targets_b),
        }
    }
}

/// True unless both target lists are known and disjoint.
pub fn may_share_target(targets_a: &[String], targets_b: &[String]) -> bool {
    targets_a.is_empty() || targets_b.is_empty() || targets_a.iter().any(|t| targets_b.contains(t))
}
