//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps every event in a `Vec` behind a `Mutex`, so a
//! single writer can be shared by concurrent pipeline runs. Use
//! `records_for()` to read back one request's trail, `export_log()` for a
//! sealed copy of the whole chain, and `verify_integrity()` at any time to
//! confirm nothing was altered in memory.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use opsgate_contracts::{
    audit::AuditRecord,
    error::{OpsgateError, OpsgateResult},
    ids::DecisionId,
};
use opsgate_core::traits::AuditWriter;

use crate::{
    chain::{verify_chain, ChainState},
    event::{AuditEvent, AuditLog},
};

pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,
    chain: ChainState,
}

/// An in-memory, append-only audit writer backed by a SHA-256 hash chain.
pub struct InMemoryAuditWriter {
    pub(crate) state: Mutex<InMemoryState>,
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self { state: Mutex::new(InMemoryState { events: Vec::new(), chain: ChainState::new() }) }
    }

    /// Every record written for `decision_id`, in write order.
    pub fn records_for(&self, decision_id: &DecisionId) -> Vec<AuditRecord> {
        self.read()
            .events
            .iter()
            .filter(|e| e.decision_id == *decision_id)
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A sealed copy of every event written so far.
    pub fn export_log(&self) -> OpsgateResult<AuditLog> {
        let state = self.read();
        Ok(AuditLog {
            events: state.events.clone(),
            exported_at: Utc::now(),
            terminal_hash: state.events.last().map(|e| e.this_hash.clone()).unwrap_or_default(),
        })
    }

    /// Recheck prev-hash linkage and every event hash.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read().events)
    }

    /// Writes refuse a poisoned lock.
    fn lock(&self) -> OpsgateResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| OpsgateError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    /// Reads see the events as they stand after a poisoning panic; a torn
    /// chain still shows up in `verify_integrity`.
    fn read(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("audit state lock poisoned; reading recovered state");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Default for InMemoryAuditWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: &AuditRecord) -> OpsgateResult<()> {
        let mut state = self.lock()?;
        let event = state.chain.prepare(record)?;
        state.chain.commit(&event);
        debug!(
            decision_id = %event.decision_id,
            stage = ?record.stage(),
            sequence = event.sequence,
            "audit record appended"
        );
        state.events.push(event);
        Ok(())
    }

    fn finalize(&self, decision_id: &DecisionId) -> OpsgateResult<()> {
        let mut state = self.lock()?;
        let record_count = state.chain.finalize(decision_id)?;
        info!(
            decision_id = %decision_id,
            record_count,
            terminal_hash = %state.chain.last_hash,
            "audit trail finalized"
        );
        Ok(())
    }
}
