//! Wiring of the real opsgate components around a chosen backend.

use std::sync::Arc;

use tracing::debug;

use opsgate_audit::InMemoryAuditWriter;
use opsgate_contracts::error::OpsgateResult;
use opsgate_core::{traits::ReasoningBackend, Pipeline, PipelineConfig};
use opsgate_policy::TieredPolicyEngine;
use opsgate_registry::ToolRegistry;
use opsgate_verify::SchemaVerifier;

use crate::mock_data::{MockInventory, CATALOG, POLICY};

/// A pipeline plus an inspectable handle on its audit trail.
pub struct OpsRuntime {
    pub pipeline: Pipeline,
    pub audit: Arc<InMemoryAuditWriter>,
    pub registry: Arc<ToolRegistry>,
}

impl OpsRuntime {
    /// The reference catalog and policy with default tuning.
    pub fn reference(backend: Arc<dyn ReasoningBackend>) -> OpsgateResult<Self> {
        Self::build(CATALOG, &PipelineConfig::default(), backend)
    }

    /// Any catalog, the reference policy, and the mock inventory.
    pub fn build(
        catalog: &str,
        config: &PipelineConfig,
        backend: Arc<dyn ReasoningBackend>,
    ) -> OpsgateResult<Self> {
        config.validate()?;
        let registry = Arc::new(ToolRegistry::from_toml_str(catalog)?);
        let policy = TieredPolicyEngine::from_toml_str(POLICY)?;
        let audit = Arc::new(InMemoryAuditWriter::new());

        let pipeline = Pipeline::new(
            config,
            registry.clone(),
            backend,
            Arc::new(SchemaVerifier::new()),
            Arc::new(policy),
            audit.clone(),
        )
        .with_inventory(Arc::new(MockInventory));

        debug!(tools = registry.len(), backend_timeout_ms = config.backend_timeout_ms, "ops runtime wired");
        Ok(Self { pipeline, audit, registry })
    }
}
