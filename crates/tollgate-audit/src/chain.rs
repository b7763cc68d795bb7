//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of record (serde_json with no pretty-printing)

use sha2::{Digest, Sha256};

use tollgate_contracts::{
    agent::RunId,
    error::{TollgateError, TollgateResult},
    execution::RunRecord,
};

use crate::event::AuditEvent;

/// Compute the SHA-256 hash for a single audit event.
///
/// Returns a lowercase 64-character hex string, or `AuditWriteFailed` if the
/// record cannot be serialized.
pub fn hash_event(run_id: &RunId, sequence: u64, record: &RunRecord, prev_hash: &str) -> TollgateResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| TollgateError::AuditWriteFailed {
        reason: format!("run record could not be serialized: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(run_id.as_str().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of one run's hash chain.
///
/// Valid when every event:
///
/// 1. sits at the expected `sequence` and belongs to the same run as the
///    first event,
/// 2. links to the preceding event's `this_hash` (or `GENESIS_HASH`),
/// 3. carries a `this_hash` equal to the value recomputed from its fields,
///    over a record whose own `run_id` matches the chain.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let Some(first) = events.first() else {
        return true;
    };
    let run_id = &first.run_id;
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for (idx, event) in events.iter().enumerate() {
        if event.sequence != idx as u64 || &event.run_id != run_id || &event.record.run_id != run_id {
            return false;
        }
        if event.prev_hash != expected_prev {
            return false;
        }
        match hash_event(&event.run_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }
        expected_prev = event.this_hash.clone();
    }

    true
}
