//! # opsgate-core
//!
//! The request-to-plan pipeline for operational requests.
//!
//! This crate provides:
//! - The trait seams (`ReasoningBackend`, `ResponseVerifier`, `PolicyEngine`,
//!   `AuditWriter`, `InventoryResolver`)
//! - The `BackendGateway` that bounds and verifies every backend call
//! - Stage A `Classifier`, Stage B `Selector`, Stage C `Planner`
//! - The `Pipeline` that chains them and writes the audit trail
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opsgate_core::{Pipeline, PipelineConfig, PipelineOutcome};
//!
//! let pipeline = Pipeline::new(&config, registry, backend, verifier, policy, audit);
//! match pipeline.run("Stop the nginx service on web-01", &context).await? {
//!     PipelineOutcome::Planned(plan) => execute(plan),
//!     PipelineOutcome::NeedsClarification { prompt, .. } => ask(prompt),
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod entities;
pub mod gateway;
pub mod lexicon;
pub mod matcher;
pub mod pipeline;
pub mod planner;
pub mod scoring;
pub mod selector;
pub mod traits;

pub use classifier::Classifier;
pub use config::PipelineConfig;
pub use gateway::BackendGateway;
pub use matcher::{CapabilityMatcher, ToolMatch};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use planner::Planner;
pub use selector::Selector;
