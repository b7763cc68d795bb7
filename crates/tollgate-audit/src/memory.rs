//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps one hash chain per run id behind a `Mutex`, so
//! a single writer can be shared by a runner serving many runs. A suspended
//! run's chain stays open across the pause; events written on resume extend
//! the same chain. `finalize()` seals a chain.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use tollgate_contracts::{
    agent::RunId,
    error::{TollgateError, TollgateResult},
    execution::RunRecord,
};
use tollgate_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

/// One run's chain.
pub(crate) struct RunChain {
    pub(crate) events: Vec<AuditEvent>,
    /// `this_hash` of the last event, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,
    pub(crate) finalized: bool,
}

impl RunChain {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            finalized: false,
        }
    }
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An in-memory, append-only run journal backed by per-run SHA-256 chains.
#[derive(Default)]
pub struct InMemoryAuditWriter {
    pub(crate) state: Mutex<HashMap<RunId, RunChain>>,
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> TollgateResult<MutexGuard<'_, HashMap<RunId, RunChain>>> {
        self.state.lock().map_err(|e| TollgateError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    /// Runs with at least one event, sorted by id.
    pub fn run_ids(&self) -> TollgateResult<Vec<RunId>> {
        let state = self.lock()?;
        let mut ids: Vec<RunId> = state.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Export the journal of `run_id`, or `None` if nothing was written for it.
    pub fn export_log(&self, run_id: &RunId) -> TollgateResult<Option<AuditLog>> {
        let state = self.lock()?;
        Ok(state.get(run_id).map(|chain| AuditLog {
            run_id: run_id.clone(),
            events: chain.events.clone(),
            finalized: chain.finalized,
            exported_at: Utc::now(),
            terminal_hash: chain.events.last().map(|e| e.this_hash.clone()).unwrap_or_default(),
        }))
    }

    /// Check that the chain of `run_id` has not been tampered with in memory.
    /// A run with no events is trivially intact.
    pub fn verify_integrity(&self, run_id: &RunId) -> TollgateResult<bool> {
        let state = self.lock()?;
        Ok(state.get(run_id).map_or(true, |chain| verify_chain(&chain.events)))
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    /// Append `record` to the chain of its run.
    ///
    /// Fails with `AuditWriteFailed` once the run has been finalized.
    fn write(&self, record: &RunRecord) -> TollgateResult<()> {
        let mut state = self.lock()?;
        let chain = state.entry(record.run_id.clone()).or_insert_with(RunChain::new);

        if chain.finalized {
            return Err(TollgateError::AuditWriteFailed {
                reason: format!("run '{}' is already finalized", record.run_id),
            });
        }

        let sequence = chain.events.len() as u64;
        let prev_hash = chain.last_hash.clone();
        let this_hash = hash_event(&record.run_id, sequence, record, &prev_hash)?;

        debug!(run_id = %record.run_id, sequence, "audit event appended");

        chain.events.push(AuditEvent {
            sequence,
            run_id: record.run_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        chain.last_hash = this_hash;

        Ok(())
    }

    fn finalize(&self, run_id: &RunId) -> TollgateResult<()> {
        let mut state = self.lock()?;
        let chain = state.entry(run_id.clone()).or_insert_with(RunChain::new);
        chain.finalized = true;

        info!(
            run_id = %run_id,
            event_count = chain.events.len(),
            terminal_hash = %chain.last_hash,
            "audit log finalized"
        );

        Ok(())
    }
}
