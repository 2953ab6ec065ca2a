//! The embedded database: connection lifecycle, migrations, pruning, and
//! the read/write operations over each table.

use std::cell::RefCell;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::PersistenceError;
use crate::models::{Conversation, Memory, TaskRow, TaskStatus, Turn};
use crate::schema::{self, MAX_CONVERSATIONS, MAX_TURNS_PER_CONVERSATION, SCHEMA_VERSION};

pub(crate) struct Inner {
    pub(crate) conn: Connection,
    in_transaction: bool,
}

/// An open, schema-checked, pruned embedded database.
///
/// Thread-safe: every operation takes the same internal lock, so reads
/// and writes from different threads serialize. The lock is reentrant,
/// so a call into [`Database::transaction`] made from inside another
/// transaction (on the same thread) runs `f` inline against the open
/// connection rather than deadlocking or opening a second transaction.
pub struct Database {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl Database {
    /// Open (creating if absent) the database at `path`, running the
    /// full startup protocol: schema check/migration, pruning, integrity
    /// check.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Useful for tests.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { inner: ReentrantMutex::new(RefCell::new(Inner { conn, in_transaction: false })) };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<(), PersistenceError> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        match Self::schema_version(&inner.conn)? {
            None => {
                tracing::info!("creating new database schema");
                inner.conn.execute_batch(schema::CREATE_SCHEMA_V1)?;
                Self::set_schema_version(&inner.conn, SCHEMA_VERSION)?;
            }
            Some(db_version) if db_version < SCHEMA_VERSION => {
                tracing::info!(from = db_version, to = SCHEMA_VERSION, "migrating database");
                Self::migrate(&mut inner.conn, db_version, SCHEMA_VERSION)?;
            }
            Some(db_version) if db_version > SCHEMA_VERSION => {
                return Err(PersistenceError::SchemaMismatch {
                    db_version,
                    code_version: SCHEMA_VERSION,
                });
            }
            Some(db_version) => {
                tracing::info!(version = db_version, "database schema up to date");
            }
        }

        Self::prune_on_startup(&inner.conn)?;
        Self::verify_integrity(&inner.conn)?;
        Ok(())
    }

    fn schema_version(conn: &Connection) -> Result<Option<i64>, PersistenceError> {
        let result = conn.query_row(
            "SELECT version FROM schema_version ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        );
        match result {
            Ok(version) => Ok(Some(version)),
            Err(rusqlite::Error::SqliteFailure(_, _)) => Ok(None),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    fn set_schema_version(conn: &Connection, version: i64) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn migrate(conn: &mut Connection, from_version: i64, to_version: i64) -> Result<(), PersistenceError> {
        for version in (from_version + 1)..=to_version {
            let tx = conn.transaction()?;
            if let Some(sql) = schema::migration_sql(version) {
                if let Err(err) = tx.execute_batch(sql) {
                    return Err(PersistenceError::MigrationFailed {
                        version,
                        reason: err.to_string(),
                    });
                }
            }
            Self::set_schema_version(&tx, version)?;
            tx.commit()?;
        }
        Ok(())
    }

    fn prune_on_startup(conn: &Connection) -> Result<(), PersistenceError> {
        tracing::info!("running startup pruning");

        let mut stmt = conn.prepare(
            "SELECT conversation_id, COUNT(*) as turn_count
             FROM turns GROUP BY conversation_id HAVING turn_count > ?1",
        )?;
        let excess_rows: Vec<(String, i64)> = stmt
            .query_map(params![MAX_TURNS_PER_CONVERSATION], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? - MAX_TURNS_PER_CONVERSATION))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        for (conversation_id, excess) in excess_rows {
            conn.execute(
                "DELETE FROM turns WHERE id IN (
                    SELECT id FROM turns WHERE conversation_id = ?1
                    ORDER BY timestamp ASC LIMIT ?2
                )",
                params![conversation_id, excess],
            )?;
            tracing::info!(conversation_id, excess, "pruned excess turns");
        }

        let conversation_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        if conversation_count > MAX_CONVERSATIONS {
            let excess = conversation_count - MAX_CONVERSATIONS;
            conn.execute(
                "DELETE FROM conversations WHERE id IN (
                    SELECT id FROM conversations ORDER BY created_at ASC LIMIT ?1
                )",
                params![excess],
            )?;
            tracing::info!(excess, "pruned old conversations");
        }

        Ok(())
    }

    fn verify_integrity(conn: &Connection) -> Result<(), PersistenceError> {
        let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if result != "ok" {
            return Err(PersistenceError::IntegrityCheckFailed(result));
        }
        Ok(())
    }

    /// Run `f` inside a transaction. A call already nested inside another
    /// `transaction()` call (on the same thread) runs `f` inline against
    /// the same connection rather than opening a second transaction.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let guard = self.inner.lock();

        if guard.borrow().in_transaction {
            let inner = guard.borrow();
            return f(&inner.conn);
        }

        guard.borrow_mut().in_transaction = true;
        guard.borrow().conn.execute_batch("BEGIN")?;

        let result = f(&guard.borrow().conn);

        let finalize = guard
            .borrow()
            .conn
            .execute_batch(if result.is_ok() { "COMMIT" } else { "ROLLBACK" });
        guard.borrow_mut().in_transaction = false;

        if let Err(err) = finalize {
            tracing::error!(error = %err, "transaction finalize failed");
            return Err(err.into());
        }
        if result.is_err() {
            tracing::error!("transaction rolled back");
        }
        result
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, PersistenceError>) -> Result<T, PersistenceError> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        f(&inner.conn)
    }

    // ===== Conversations =====

    /// Insert or replace a conversation row.
    pub fn save_conversation(&self, conn: &Connection, conv: &Conversation) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT OR REPLACE INTO conversations (id, created_at, meta) VALUES (?1, ?2, ?3)",
            params![conv.id, conv.created_at.to_rfc3339(), conv.meta.to_string()],
        )?;
        Ok(())
    }

    /// Fetch a conversation by id.
    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, PersistenceError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, created_at, meta FROM conversations WHERE id = ?1",
                params![id],
                row_to_conversation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Fetch a conversation, creating it if `id` is absent or `None`.
    pub fn get_or_create_conversation(&self, id: Option<&str>) -> Result<Conversation, PersistenceError> {
        if let Some(id) = id {
            if let Some(conv) = self.get_conversation(id)? {
                return Ok(conv);
            }
        }
        let mut conv = Conversation::new();
        if let Some(id) = id {
            conv.id = id.to_string();
        }
        self.with_conn(|conn| self.save_conversation(conn, &conv))?;
        Ok(conv)
    }

    /// List the most recently created conversations.
    pub fn list_conversations(&self, limit: i64) -> Result<Vec<Conversation>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, meta FROM conversations ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_conversation)?;
            rows.collect::<Result<_, _>>().map_err(Into::into)
        })
    }

    // ===== Turns =====

    /// Insert or replace a turn row.
    pub fn save_turn(&self, conn: &Connection, turn: &Turn) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT OR REPLACE INTO turns
                (id, conversation_id, turn_id, role, content, timestamp, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                turn.id,
                turn.conversation_id,
                turn.turn_id,
                turn.role,
                turn.content,
                turn.timestamp.to_rfc3339(),
                turn.meta.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Fetch turns for a conversation, oldest first.
    pub fn get_turns(&self, conversation_id: &str, limit: i64, offset: i64) -> Result<Vec<Turn>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, turn_id, role, content, timestamp, meta
                 FROM turns WHERE conversation_id = ?1
                 ORDER BY timestamp ASC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit, offset], row_to_turn)?;
            rows.collect::<Result<_, _>>().map_err(Into::into)
        })
    }

    /// Fetch the most recent `count` turns, oldest first (for building a
    /// bounded context window).
    pub fn get_recent_turns(&self, conversation_id: &str, count: i64) -> Result<Vec<Turn>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, turn_id, role, content, timestamp, meta FROM (
                    SELECT id, conversation_id, turn_id, role, content, timestamp, meta
                    FROM turns WHERE conversation_id = ?1
                    ORDER BY timestamp DESC LIMIT ?2
                 ) ORDER BY timestamp ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id, count], row_to_turn)?;
            rows.collect::<Result<_, _>>().map_err(Into::into)
        })
    }

    // ===== Memories =====

    /// Insert or replace a memory entry.
    pub fn save_memory(&self, conn: &Connection, memory: &Memory) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT OR REPLACE INTO memories (id, key, value, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                memory.id,
                memory.key,
                memory.value.as_ref().map(|v| v.to_string()),
                memory.embedding,
                memory.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a memory entry by key.
    pub fn get_memory(&self, key: &str) -> Result<Option<Memory>, PersistenceError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, key, value, embedding, created_at, updated_at FROM memories WHERE key = ?1",
                params![key],
                row_to_memory,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Delete a memory entry by key. Returns whether a row was removed.
    pub fn delete_memory(&self, key: &str) -> Result<bool, PersistenceError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM memories WHERE key = ?1", params![key])?;
            Ok(affected > 0)
        })
    }

    // ===== Tasks =====

    /// Insert or replace a scheduled-task row.
    pub fn save_task(&self, conn: &Connection, task: &TaskRow) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, name, action, status, scheduled_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task.id,
                task.name,
                task.action,
                task.status.as_str(),
                task.scheduled_time.map(|t| t.to_rfc3339()),
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch every pending task, ordered by scheduled time.
    pub fn get_pending_tasks(&self) -> Result<Vec<TaskRow>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, action, status, scheduled_time, created_at
                 FROM tasks WHERE status = 'pending' ORDER BY scheduled_time ASC",
            )?;
            let rows = stmt.query_map([], row_to_task)?;
            rows.collect::<Result<_, _>>().map_err(Into::into)
        })
    }

    /// Update a task's status. Returns whether a row was affected.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, PersistenceError> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(affected > 0)
        })
    }

    pub(crate) fn lock_conn(&self) -> ReentrantMutexGuard<'_, RefCell<Inner>> {
        self.inner.lock()
    }
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    let created_at: String = row.get(1)?;
    let meta: String = row.get(2)?;
    Ok(Conversation {
        id: row.get(0)?,
        created_at: parse_rfc3339(&created_at),
        meta: serde_json::from_str(&meta).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_turn(row: &rusqlite::Row) -> rusqlite::Result<Turn> {
    let timestamp: String = row.get(5)?;
    let meta: String = row.get(6)?;
    Ok(Turn {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        turn_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        role: row.get(3)?,
        content: row.get(4)?,
        timestamp: parse_rfc3339(&timestamp),
        meta: serde_json::from_str(&meta).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let value: Option<String> = row.get(2)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Memory {
        id: row.get(0)?,
        key: row.get(1)?,
        value: value.and_then(|v| serde_json::from_str(&v).ok()),
        embedding: row.get(3)?,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRow> {
    let status: String = row.get(3)?;
    let scheduled_time: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(TaskRow {
        id: row.get(0)?,
        name: row.get(1)?,
        action: row.get(2)?,
        status: TaskStatus::parse(&status),
        scheduled_time: scheduled_time.map(|t| parse_rfc3339(&t)),
        created_at: parse_rfc3339(&created_at),
    })
}

fn parse_rfc3339(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_creates_schema_at_current_version() {
        let db = Database::open_in_memory().unwrap();
        let guard = db.inner.lock();
        let version: i64 = guard
            .borrow()
            .conn
            .query_row("SELECT version FROM schema_version ORDER BY id DESC LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn conversation_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let conv = Conversation::new();
        db.transaction(|conn| db.save_conversation(conn, &conv)).unwrap();
        let fetched = db.get_conversation(&conv.id).unwrap().unwrap();
        assert_eq!(fetched.id, conv.id);
    }

    #[test]
    fn get_or_create_conversation_creates_when_absent() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.get_or_create_conversation(Some("conv-1")).unwrap();
        assert_eq!(conv.id, "conv-1");
        let again = db.get_or_create_conversation(Some("conv-1")).unwrap();
        assert_eq!(again.id, conv.id);
    }

    #[test]
    fn turns_are_ordered_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.get_or_create_conversation(Some("conv-1")).unwrap();
        for (i, role) in ["user", "assistant", "user"].iter().enumerate() {
            let turn = Turn {
                id: format!("turn-{i}"),
                conversation_id: conv.id.clone(),
                turn_id: format!("t{i}"),
                role: role.to_string(),
                content: format!("message {i}"),
                timestamp: Utc::now() + chrono::Duration::seconds(i as i64),
                meta: serde_json::Value::Null,
            };
            db.transaction(|conn| db.save_turn(conn, &turn)).unwrap();
        }
        let turns = db.get_turns(&conv.id, 10, 0).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, "message 0");
    }

    #[test]
    fn memory_round_trips_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        let memory = Memory {
            id: "mem-1".to_string(),
            key: "favorite_color".to_string(),
            value: Some(serde_json::json!("blue")),
            embedding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.transaction(|conn| db.save_memory(conn, &memory)).unwrap();
        assert_eq!(db.get_memory("favorite_color").unwrap().unwrap().value, Some(serde_json::json!("blue")));
        assert!(db.delete_memory("favorite_color").unwrap());
        assert!(db.get_memory("favorite_color").unwrap().is_none());
    }

    #[test]
    fn task_status_updates_are_visible_in_pending_list() {
        let db = Database::open_in_memory().unwrap();
        let task = TaskRow {
            id: "task-1".to_string(),
            name: "daily briefing".to_string(),
            action: "give me the news".to_string(),
            status: TaskStatus::Pending,
            scheduled_time: Some(Utc::now()),
            created_at: Utc::now(),
        };
        db.transaction(|conn| db.save_task(conn, &task)).unwrap();
        assert_eq!(db.get_pending_tasks().unwrap().len(), 1);
        assert!(db.update_task_status("task-1", TaskStatus::Completed).unwrap());
        assert!(db.get_pending_tasks().unwrap().is_empty());
    }

    #[test]
    fn schema_downgrade_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        {
            let guard = db.inner.lock();
            Database::set_schema_version(&guard.borrow().conn, SCHEMA_VERSION + 1).unwrap();
        }
        let result = Database::initialize(&db);
        assert!(matches!(result, Err(PersistenceError::SchemaMismatch { .. })));
    }

    #[test]
    fn nested_transactions_run_inline() {
        let db = Database::open_in_memory().unwrap();
        let conv = Conversation::new();
        db.transaction(|conn| {
            db.save_conversation(conn, &conv)?;
            db.transaction(|inner_conn| {
                inner_conn.execute("SELECT 1", []).map(|_| ()).map_err(Into::into)
            })
        })
        .unwrap();
        assert!(db.get_conversation(&conv.id).unwrap().is_some());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let conv = Conversation::new();
        let result: Result<(), PersistenceError> = db.transaction(|conn| {
            db.save_conversation(conn, &conv)?;
            Err(PersistenceError::IntegrityCheckFailed("forced rollback".into()))
        });
        assert!(result.is_err());
        assert!(db.get_conversation(&conv.id).unwrap().is_none());
    }
}
