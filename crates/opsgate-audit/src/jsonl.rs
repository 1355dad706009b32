//! JSON-lines file implementation of `AuditWriter`.
//!
//! One `AuditEvent` per line, appended and synced before the write returns.
//! Opening an existing file replays it, checks the chain, and continues it.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use opsgate_contracts::{
    audit::AuditRecord,
    error::{OpsgateError, OpsgateResult},
    ids::DecisionId,
};
use opsgate_core::traits::AuditWriter;

use crate::{
    chain::{verify_chain, ChainState},
    event::AuditEvent,
};

fn io_err(path: &Path, e: std::io::Error) -> OpsgateError {
    OpsgateError::AuditWriteFailed { reason: format!("audit file '{}': {}", path.display(), e) }
}

/// Read and parse every event in a JSON-lines audit file.
///
/// Blank lines are skipped. The chain is not verified here; pass the result
/// to `verify_chain`.
pub fn read_log(path: &Path) -> OpsgateResult<Vec<AuditEvent>> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str::<AuditEvent>(&line).map_err(|e| OpsgateError::AuditWriteFailed {
            reason: format!("audit file '{}' line {}: {}", path.display(), index + 1, e),
        })?;
        events.push(event);
    }
    Ok(events)
}

/// An append-only audit writer persisting the hash chain to a file.
pub struct JsonlAuditWriter {
    path: PathBuf,
    state: Mutex<ChainState>,
}

impl JsonlAuditWriter {
    /// Open `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// `AuditWriteFailed` if the file cannot be read or created, a line does
    /// not parse, or the existing chain fails verification.
    pub fn open(path: impl Into<PathBuf>) -> OpsgateResult<Self> {
        let path = path.into();
        let events = if path.exists() { read_log(&path)? } else { Vec::new() };
        if !verify_chain(&events) {
            return Err(OpsgateError::AuditWriteFailed {
                reason: format!("audit file '{}' has a broken hash chain", path.display()),
            });
        }
        OpenOptions::new().create(true).append(true).open(&path).map_err(|e| io_err(&path, e))?;
        debug!(path = %path.display(), existing_events = events.len(), "audit file opened");
        Ok(Self { path, state: Mutex::new(ChainState::resume(&events)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> OpsgateResult<std::sync::MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| OpsgateError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

impl AuditWriter for JsonlAuditWriter {
    fn write(&self, record: &AuditRecord) -> OpsgateResult<()> {
        let mut state = self.lock()?;
        let event = state.prepare(record)?;
        let line = serde_json::to_string(&event).map_err(|e| OpsgateError::AuditWriteFailed {
            reason: format!("audit event is not serializable: {e}"),
        })?;

        let mut file = OpenOptions::new().append(true).open(&self.path).map_err(|e| io_err(&self.path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| io_err(&self.path, e))?;
        file.write_all(b"\n").map_err(|e| io_err(&self.path, e))?;
        file.sync_data().map_err(|e| io_err(&self.path, e))?;

        // Only advance once the line is durable.
        state.commit(&event);
        debug!(
            decision_id = %event.decision_id,
            stage = ?record.stage(),
            sequence = event.sequence,
            "audit record appended to file"
        );
        Ok(())
    }

    fn finalize(&self, decision_id: &DecisionId) -> OpsgateResult<()> {
        let mut state = self.lock()?;
        let record_count = state.finalize(decision_id)?;
        info!(
            decision_id = %decision_id,
            record_count,
            terminal_hash = %state.last_hash,
            path = %self.path.display(),
            "audit trail finalized"
        );
        Ok(())
    }
}
