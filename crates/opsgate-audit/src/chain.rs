//! Hash-chain primitives: hashing, chain integrity verification, and the
//! bookkeeping shared by every writer.
//!
//! Hash input layout (bytes, in order):
//!   1. decision_id as its hyphenated UUID string
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the record (serde_json, no pretty-printing)

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use opsgate_contracts::{
    audit::{AuditRecord, AuditStage},
    error::{OpsgateError, OpsgateResult},
    ids::DecisionId,
};

use crate::event::AuditEvent;

/// Compute the SHA-256 hash for a single audit event.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    decision_id: &DecisionId,
    sequence: u64,
    record: &AuditRecord,
    prev_hash: &str,
) -> OpsgateResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| OpsgateError::AuditWriteFailed {
        reason: format!("audit record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(decision_id.to_string().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a hash chain.
///
/// Valid when every event's `prev_hash` equals the preceding `this_hash`
/// (`GENESIS_HASH` for the first), every `this_hash` matches the value
/// recomputed from its own fields, and sequences run 0, 1, 2, ... An empty
/// chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }
        if event.decision_id != event.record.decision_id {
            return false;
        }
        match hash_event(&event.decision_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }
        expected_prev = event.this_hash.clone();
    }

    true
}

// ── Chain state ───────────────────────────────────────────────────────────────

/// Sequence, tip hash, and write-once bookkeeping for one chain.
#[derive(Debug)]
pub(crate) struct ChainState {
    pub(crate) sequence: u64,
    pub(crate) last_hash: String,
    written: HashSet<(DecisionId, AuditStage)>,
    finalized: HashSet<DecisionId>,
}

impl ChainState {
    pub(crate) fn new() -> Self {
        Self {
            sequence: 0,
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            written: HashSet::new(),
            finalized: HashSet::new(),
        }
    }

    /// Rebuild the state of an existing chain from its events. Finalization
    /// is not recorded in the chain, so every request is writable again.
    pub(crate) fn resume(events: &[AuditEvent]) -> Self {
        let mut state = Self::new();
        for event in events {
            state.written.insert((event.decision_id, event.record.stage()));
            state.sequence = event.sequence + 1;
            state.last_hash = event.this_hash.clone();
        }
        state
    }

    /// Build the next event for `record` without committing it.
    ///
    /// Rejects a second record for the same (decision_id, stage) and any
    /// record for a finalized request.
    pub(crate) fn prepare(&self, record: &AuditRecord) -> OpsgateResult<AuditEvent> {
        let decision_id = record.decision_id;
        let stage = record.stage();
        if self.finalized.contains(&decision_id) {
            return Err(OpsgateError::AuditWriteFailed {
                reason: format!("decision {decision_id} is already finalized"),
            });
        }
        if self.written.contains(&(decision_id, stage)) {
            return Err(OpsgateError::AuditWriteFailed {
                reason: format!("a {stage:?} record for decision {decision_id} was already written"),
            });
        }

        let prev_hash = self.last_hash.clone();
        let this_hash = hash_event(&decision_id, self.sequence, record, &prev_hash)?;
        Ok(AuditEvent {
            sequence: self.sequence,
            decision_id,
            record: record.clone(),
            prev_hash,
            this_hash,
        })
    }

    /// Advance past an event returned by `prepare` once it is stored.
    pub(crate) fn commit(&mut self, event: &AuditEvent) {
        self.written.insert((event.decision_id, event.record.stage()));
        self.sequence = event.sequence + 1;
        self.last_hash = event.this_hash.clone();
    }

    pub(crate) fn finalize(&mut self, decision_id: &DecisionId) -> OpsgateResult<usize> {
        let count = self.written.iter().filter(|(id, _)| id == decision_id).count();
        if count == 0 {
            return Err(OpsgateError::AuditWriteFailed {
                reason: format!("no records written for decision {decision_id}"),
            });
        }
        if !self.finalized.insert(*decision_id) {
            return Err(OpsgateError::AuditWriteFailed {
                reason: format!("decision {decision_id} is already finalized"),
            });
        }
        Ok(count)
    }
}
