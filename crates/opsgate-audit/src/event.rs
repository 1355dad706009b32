//! Audit event and log types.
//!
//! `AuditEvent` is a single entry in the hash chain. It wraps an
//! `AuditRecord` with a sequence number and the SHA-256 hashes that make
//! tampering detectable. `AuditLog` is the sealed export of a whole trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsgate_contracts::{audit::AuditRecord, ids::DecisionId};

/// A single entry in the SHA-256 hash chain.
///
/// One chain spans every request a writer has seen; `decision_id` keys the
/// entry to its request. Modifying any field, including the embedded
/// record, invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub decision_id: DecisionId,

    pub record: AuditRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Computed by `hash_event()` over (decision_id, sequence, prev_hash,
    /// canonical JSON of record).
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed export of an audit trail.
///
/// `terminal_hash` is the `this_hash` of the last event and commits to the
/// entire log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub events: Vec<AuditEvent>,

    pub exported_at: DateTime<Utc>,

    /// Empty string if the log is empty.
    pub terminal_hash: String,
}
