#![deny(missing_docs)]
//! HMAC-chained, append-only audit log.
//!
//! Tamper-evident, not tamper-proof: an attacker with both database and
//! key access can recompute the chain. The guarantee is that a reader
//! holding the key can detect any entry that was altered or removed
//! after the fact.

mod entry;
mod key;

pub use entry::{Actor, AuditEntry, EventType, GENESIS_HASH};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Storage backend for audit entries. Kept as a narrow trait so this
/// crate doesn't need to know how entries are persisted — the
/// persistence layer provides the real implementation; an in-memory one
/// is enough for tests and embedding contexts with no database.
pub trait AuditStore: Send + Sync {
    /// The hash of the most recently appended entry, or [`GENESIS_HASH`]
    /// if the store is empty.
    fn last_hash(&self) -> String;

    /// Append an entry (with its hash fields already computed),
    /// returning its assigned id.
    fn append(&self, entry: AuditEntry) -> i64;

    /// All entries for one turn, in insertion order.
    fn entries_for_turn(&self, turn_id: &str) -> Vec<AuditEntry>;

    /// Entries with id in `[from_id, to_id]` (or `from_id..` if `to_id`
    /// is `None`), oldest first, capped at `limit`.
    fn entries_in_range(&self, from_id: i64, to_id: Option<i64>, limit: usize) -> Vec<AuditEntry>;

    /// The entry immediately preceding `id`, if any.
    fn entry_before(&self, id: i64) -> Option<AuditEntry>;
}

/// An in-memory [`AuditStore`], useful for tests and for running
/// without a persistence backend.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn last_hash(&self) -> String {
        self.entries
            .lock()
            .expect("audit store poisoned")
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    fn append(&self, mut entry: AuditEntry) -> i64 {
        let mut entries = self.entries.lock().expect("audit store poisoned");
        let id = entries.len() as i64 + 1;
        entry.id = Some(id);
        entries.push(entry);
        id
    }

    fn entries_for_turn(&self, turn_id: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit store poisoned")
            .iter()
            .filter(|e| e.turn_id == turn_id)
            .cloned()
            .collect()
    }

    fn entries_in_range(&self, from_id: i64, to_id: Option<i64>, limit: usize) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit store poisoned")
            .iter()
            .filter(|e| {
                let id = e.id.unwrap_or_default();
                id >= from_id && to_id.map(|to| id <= to).unwrap_or(true)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    fn entry_before(&self, id: i64) -> Option<AuditEntry> {
        self.entries
            .lock()
            .expect("audit store poisoned")
            .iter()
            .find(|e| e.id == Some(id - 1))
            .cloned()
    }
}

/// Outcome of [`AuditLog::verify_chain`].
#[derive(Debug, Clone)]
pub struct VerifyResult {
    /// Whether every checked entry's chain linkage and hash matched.
    pub valid: bool,
    /// Number of entries examined.
    pub entries_checked: usize,
    /// The id of the first entry where verification failed, if any.
    pub broken_at: Option<i64>,
    /// Human-readable description of the failure, if any.
    pub error: Option<String>,
}

/// Errors raised constructing an audit entry.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AuditError {
    /// The entry's `details` value could not be canonically serialized.
    #[error("failed to serialize audit details: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Canonical serialization of the fields an entry's HMAC is computed
/// over. `serde_json::Value`'s object map is key-sorted by default
/// (no `preserve_order` feature enabled anywhere in this workspace), and
/// `serde_json::to_vec` emits compact output with no extra whitespace —
/// together these reproduce Python's `json.dumps(..., sort_keys=True,
/// separators=(',', ':'))` determinism without hand-rolling it.
fn canonical_payload(entry: &AuditEntry, prev_hash: &str) -> Result<Vec<u8>, AuditError> {
    let payload = serde_json::json!({
        "prev_hash": prev_hash,
        "turn_id": entry.turn_id,
        "timestamp": entry.timestamp.to_rfc3339(),
        "event_type": entry.event_type,
        "actor": entry.actor,
        "action": entry.action,
        "target": entry.target,
        "details": entry.details,
    });
    Ok(serde_json::to_vec(&payload)?)
}

fn compute_hash(key: &[u8], entry: &AuditEntry, prev_hash: &str) -> Result<String, AuditError> {
    let payload = canonical_payload(entry, prev_hash)?;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// HMAC-chained audit log bound to a storage backend.
pub struct AuditLog<'a> {
    store: &'a dyn AuditStore,
    key: Vec<u8>,
}

impl<'a> AuditLog<'a> {
    /// Construct a log over `store`, sourcing its HMAC key from
    /// `JARVIS_AUDIT_KEY` or the machine-derived fallback.
    pub fn new(store: &'a dyn AuditStore) -> Self {
        Self { store, key: key::load_key() }
    }

    /// Construct a log with an explicit key, bypassing environment
    /// lookup (used in tests and anywhere the key is sourced elsewhere,
    /// e.g. a secrets manager).
    pub fn with_key(store: &'a dyn AuditStore, key: Vec<u8>) -> Self {
        Self { store, key }
    }

    /// Append one entry to the chain, returning its hash.
    pub fn log(
        &self,
        event_type: EventType,
        actor: Actor,
        action: impl Into<String>,
        turn_id: impl Into<String>,
        target: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Result<String, AuditError> {
        let mut entry = AuditEntry::new(turn_id, event_type, actor, action, target, details);
        let prev_hash = self.store.last_hash();
        entry.prev_hash = prev_hash.clone();
        entry.entry_hash = compute_hash(&self.key, &entry, &prev_hash)?;
        let hash = entry.entry_hash.clone();
        tracing::debug!(
            event_type = ?entry.event_type,
            actor = ?entry.actor,
            action = %entry.action,
            turn_id = %entry.turn_id,
            "audit entry appended"
        );
        self.store.append(entry);
        Ok(hash)
    }

    /// All entries for one turn, in order.
    pub fn get_turn_trail(&self, turn_id: &str) -> Vec<AuditEntry> {
        self.store.entries_for_turn(turn_id)
    }

    /// Entries in an id range.
    pub fn get_entries(&self, from_id: i64, to_id: Option<i64>, limit: usize) -> Vec<AuditEntry> {
        self.store.entries_in_range(from_id, to_id, limit)
    }

    /// Verify chain integrity over `[from_id, to_id]`.
    pub fn verify_chain(&self, from_id: i64, to_id: Option<i64>) -> VerifyResult {
        let entries = self.store.entries_in_range(from_id, to_id, usize::MAX);
        if entries.is_empty() {
            return VerifyResult { valid: true, entries_checked: 0, broken_at: None, error: None };
        }

        let mut expected_prev = if from_id == 1 {
            GENESIS_HASH.to_string()
        } else {
            self.store
                .entry_before(from_id)
                .map(|e| e.entry_hash)
                .unwrap_or_else(|| GENESIS_HASH.to_string())
        };

        for (checked, entry) in entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return VerifyResult {
                    valid: false,
                    entries_checked: checked,
                    broken_at: entry.id,
                    error: Some(format!("prev_hash mismatch at entry {:?}", entry.id)),
                };
            }
            let computed = match compute_hash(&self.key, entry, &entry.prev_hash) {
                Ok(h) => h,
                Err(e) => {
                    return VerifyResult {
                        valid: false,
                        entries_checked: checked,
                        broken_at: entry.id,
                        error: Some(e.to_string()),
                    }
                }
            };
            if entry.entry_hash != computed {
                return VerifyResult {
                    valid: false,
                    entries_checked: checked,
                    broken_at: entry.id,
                    error: Some(format!("entry_hash mismatch at entry {:?}", entry.id)),
                };
            }
            expected_prev = entry.entry_hash.clone();
        }

        VerifyResult { valid: true, entries_checked: entries.len(), broken_at: None, error: None }
    }

    /// Export a turn's entries as a plain JSON array, for human or
    /// external review.
    pub fn export_for_review(&self, turn_id: &str) -> serde_json::Value {
        serde_json::to_value(self.get_turn_trail(turn_id)).unwrap_or(serde_json::Value::Null)
    }

    /// Export `[from_id, to_id]` as the stable audit bundle format: enough
    /// metadata (`key_id`, `final_hash`, the id range) for an external
    /// verifier to re-run [`AuditLog::verify_chain`]-equivalent checks
    /// without needing direct database access.
    pub fn export_bundle(&self, from_id: i64, to_id: Option<i64>) -> AuditBundle {
        let entries = self.store.entries_in_range(from_id, to_id, usize::MAX);
        let final_hash = entries
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        AuditBundle {
            version: BUNDLE_VERSION.to_string(),
            exported_at: chrono::Utc::now(),
            entry_count: entries.len(),
            first_entry_id: entries.first().and_then(|e| e.id),
            last_entry_id: entries.last().and_then(|e| e.id),
            final_hash,
            key_id: key::fingerprint(&self.key),
            entries,
        }
    }
}

/// Format version for [`AuditBundle`]. Bumped only on a breaking change to
/// the exported shape.
pub const BUNDLE_VERSION: &str = "0.7.0";

/// The stable, externally-consumable export of a contiguous audit range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditBundle {
    /// Bundle format version.
    pub version: String,
    /// When the export was produced.
    pub exported_at: chrono::DateTime<chrono::Utc>,
    /// Number of entries in [`AuditBundle::entries`].
    pub entry_count: usize,
    /// Id of the first entry, if any.
    pub first_entry_id: Option<i64>,
    /// Id of the last entry, if any.
    pub last_entry_id: Option<i64>,
    /// `entry_hash` of the last entry, or [`GENESIS_HASH`] if empty.
    pub final_hash: String,
    /// Fingerprint of the HMAC key this bundle was signed with.
    pub key_id: String,
    /// The exported entries themselves, oldest first.
    pub entries: Vec<AuditEntry>,
}
