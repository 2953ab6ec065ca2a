//! [`jarvis_audit::AuditStore`] backed by the `audit_log` table.
//!
//! The trait's methods return bare values, not `Result` — storage
//! failures here are treated the same way the in-memory store treats
//! lock poisoning: they indicate a corrupted process state, not a
//! recoverable condition, so they panic rather than propagate.

use jarvis_audit::{Actor, AuditEntry, AuditStore, EventType, GENESIS_HASH};
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

fn enum_to_text<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value).expect("enum serialization is infallible") {
        serde_json::Value::String(s) => s,
        other => panic!("expected a string enum encoding, got {other:?}"),
    }
}

fn text_to_event_type(text: &str) -> EventType {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .unwrap_or_else(|err| panic!("unrecognized event_type {text:?} in audit_log: {err}"))
}

fn text_to_actor(text: &str) -> Actor {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .unwrap_or_else(|err| panic!("unrecognized actor {text:?} in audit_log: {err}"))
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
    let timestamp: String = row.get(2)?;
    let event_type: String = row.get(3)?;
    let actor: String = row.get(4)?;
    let details: Option<String> = row.get(7)?;

    Ok(AuditEntry {
        id: row.get(0)?,
        turn_id: row.get(1)?,
        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        event_type: text_to_event_type(&event_type),
        actor: text_to_actor(&actor),
        action: row.get(5)?,
        target: row.get(6)?,
        details: details.and_then(|d| serde_json::from_str(&d).ok()),
        prev_hash: row.get(8)?,
        entry_hash: row.get(9)?,
    })
}

impl AuditStore for Database {
    fn last_hash(&self) -> String {
        let guard = self.lock_conn();
        guard
            .borrow()
            .conn
            .query_row(
                "SELECT entry_hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .expect("audit_log query failed")
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    fn append(&self, entry: AuditEntry) -> i64 {
        let guard = self.lock_conn();
        let inner = guard.borrow();
        inner
            .conn
            .execute(
                "INSERT INTO audit_log
                    (turn_id, timestamp, event_type, actor, action, target, details, prev_hash, entry_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.turn_id,
                    entry.timestamp.to_rfc3339(),
                    enum_to_text(&entry.event_type),
                    enum_to_text(&entry.actor),
                    entry.action,
                    entry.target,
                    entry.details.as_ref().map(|d| d.to_string()),
                    entry.prev_hash,
                    entry.entry_hash,
                ],
            )
            .expect("audit_log insert failed");
        inner.conn.last_insert_rowid()
    }

    fn entries_for_turn(&self, turn_id: &str) -> Vec<AuditEntry> {
        let guard = self.lock_conn();
        let inner = guard.borrow();
        let mut stmt = inner
            .conn
            .prepare(
                "SELECT id, turn_id, timestamp, event_type, actor, action, target, details, prev_hash, entry_hash
                 FROM audit_log WHERE turn_id = ?1 ORDER BY id ASC",
            )
            .expect("audit_log prepare failed");
        stmt.query_map(params![turn_id], row_to_entry)
            .expect("audit_log query failed")
            .collect::<Result<_, _>>()
            .expect("audit_log row decode failed")
    }

    fn entries_in_range(&self, from_id: i64, to_id: Option<i64>, limit: usize) -> Vec<AuditEntry> {
        let guard = self.lock_conn();
        let inner = guard.borrow();
        let to_id = to_id.unwrap_or(i64::MAX);
        let mut stmt = inner
            .conn
            .prepare(
                "SELECT id, turn_id, timestamp, event_type, actor, action, target, details, prev_hash, entry_hash
                 FROM audit_log WHERE id >= ?1 AND id <= ?2 ORDER BY id ASC LIMIT ?3",
            )
            .expect("audit_log prepare failed");
        stmt.query_map(params![from_id, to_id, limit as i64], row_to_entry)
            .expect("audit_log query failed")
            .collect::<Result<_, _>>()
            .expect("audit_log row decode failed")
    }

    fn entry_before(&self, id: i64) -> Option<AuditEntry> {
        let guard = self.lock_conn();
        guard
            .borrow()
            .conn
            .query_row(
                "SELECT id, turn_id, timestamp, event_type, actor, action, target, details, prev_hash, entry_hash
                 FROM audit_log WHERE id = ?1",
                params![id - 1],
                row_to_entry,
            )
            .optional()
            .expect("audit_log query failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_audit::AuditLog;

    #[test]
    fn audit_entries_persist_and_chain_through_sqlite() {
        let db = Database::open_in_memory().unwrap();
        let audit = AuditLog::with_key(&db, b"test-key".to_vec());

        audit
            .log(EventType::TurnStart, Actor::System, "turn started", "turn_1", None, None)
            .unwrap();
        audit
            .log(EventType::ToolExecute, Actor::Executor, "ran a tool", "turn_1", Some("shell".into()), None)
            .unwrap();

        let trail = audit.get_turn_trail("turn_1");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].prev_hash, GENESIS_HASH);
        assert_eq!(trail[1].prev_hash, trail[0].entry_hash);

        let result = audit.verify_chain(1, None);
        assert!(result.valid);
        assert_eq!(result.entries_checked, 2);
    }
}
