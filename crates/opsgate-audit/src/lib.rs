//! # opsgate-audit
//!
//! Append-only, SHA-256 hash-chained audit trail for the opsgate pipeline.
//!
//! ## Overview
//!
//! Every finalized Decision, Selection, and Plan is wrapped in an
//! `AuditEvent` that links to the previous event via its SHA-256 hash.
//! Tampering with any event breaks the chain and is detected by
//! `verify_chain`. A writer accepts one record per (decision_id, stage)
//! and nothing for a request after it is finalized.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opsgate_audit::InMemoryAuditWriter;
//! use opsgate_core::traits::AuditWriter;
//!
//! let writer = InMemoryAuditWriter::new();
//! writer.write(&AuditRecord::decision(&decision))?;
//! writer.finalize(&decision.decision_id)?;
//!
//! assert!(writer.verify_integrity());
//! let trail = writer.records_for(&decision.decision_id);
//! ```

pub mod chain;
pub mod event;
pub mod jsonl;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use jsonl::{read_log, JsonlAuditWriter};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
