//! # opsgate-contracts
//!
//! Shared types, lookup tables, and errors for the opsgate request-to-plan
//! pipeline.
//!
//! All crates in the workspace import from here. Decision, Selection, and
//! Plan are the versioned contracts handed from one stage to the next; no
//! stage logic lives in this crate.

pub mod audit;
pub mod backend;
pub mod capability;
pub mod decision;
pub mod error;
pub mod ids;
pub mod intent;
pub mod plan;
pub mod selection;
pub mod tool;

/// Version stamped on every Decision, Selection, and Plan.
pub const CONTRACT_VERSION: u32 = 1;
