//! # opsgate-registry
//!
//! The tool registry: a catalog of executable tools with declared
//! capabilities, permissions, and production-safety flags.
//!
//! ## Overview
//!
//! [`ToolRegistry`] is filled once at startup, usually from a TOML catalog,
//! and then shared read-only (`Arc<ToolRegistry>`) by every request in
//! flight. Besides tools, a catalog declares ordering constraints between
//! tools and composite actions that expand into several tools.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use opsgate_registry::ToolRegistry;
//!
//! let registry = Arc::new(ToolRegistry::from_file(Path::new("catalog/ops.toml"))?);
//! ```

pub mod catalog;
pub mod registry;

pub use catalog::{CatalogConfig, CompositeAction, OrderingConstraint, OrderingScope};
pub use registry::{may_share_target, ToolRegistry};

// ── Tests ─────────────────────────────────────────────────────────────────────
