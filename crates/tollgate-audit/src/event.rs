//! Audit event and log types.
//!
//! `AuditEvent` is a single entry in a run's hash chain: it wraps a
//! `RunRecord` with sequence numbering and the SHA-256 hashes that make
//! tampering detectable. `AuditLog` is the exported view of one run's chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_contracts::{agent::RunId, execution::RunRecord};

/// A single entry in the SHA-256 hash chain of one run.
///
/// Each event commits to the previous event via `prev_hash`. Modifying any
/// field, including those of the embedded `record`, invalidates `this_hash`
/// and is detected by `verify_chain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the run's chain, starting at 0.
    pub sequence: u64,

    pub run_id: RunId,

    pub record: RunRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first one.
    pub prev_hash: String,

    /// Computed by `hash_event()` over (run_id, sequence, prev_hash,
    /// canonical JSON of record).
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain. 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Snapshot of one run's journal.
///
/// A suspended run exports with `finalized = false`; its chain keeps growing
/// when the run is resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub run_id: RunId,

    /// All events in chain order (sequence 0 first).
    pub events: Vec<AuditEvent>,

    /// True once the runner has finalized the run. No further events are
    /// accepted after that.
    pub finalized: bool,

    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty if the log is empty.
    pub terminal_hash: String,
}
