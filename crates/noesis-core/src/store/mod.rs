//! Node state persistence store.
//!
//! SQLite-backed storage for per-document cognitive state, keyed by document
//! path. State is stored as a JSON document so additive fields load from
//! older rows with their defaults.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{NoesisError, NoesisResult};
use crate::types::PersistedNodeState;

/// SQLite-backed store for node state.
pub struct CognitiveStore {
    conn: Arc<Mutex<Connection>>,
}

impl CognitiveStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database file and schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> NoesisResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> NoesisResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> NoesisResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS node_states (
                path TEXT PRIMARY KEY,
                node_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_node_states_node_id ON node_states(node_id);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn lock(&self) -> NoesisResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| NoesisError::database(e.to_string()))
    }

    /// Save the state of one document, replacing any previous row.
    pub fn save_state(&self, state: &PersistedNodeState) -> NoesisResult<()> {
        let conn = self.lock()?;
        upsert(&conn, state)
    }

    /// Save many states in one transaction. Returns the number written.
    pub fn save_all(&self, states: &[PersistedNodeState]) -> NoesisResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for state in states {
            upsert(&tx, state)?;
        }
        tx.commit()?;
        debug!(count = states.len(), "Saved node states");
        Ok(states.len())
    }

    /// Get the state stored for a document path.
    pub fn get_state(&self, path: &str) -> NoesisResult<Option<PersistedNodeState>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM node_states WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|s| serde_json::from_str(&s).map_err(|e| NoesisError::corrupted(path, e)))
            .transpose()
    }

    /// Load every stored state.
    ///
    /// Rows that fail to decode are logged as corrupted and skipped.
    pub fn load_all(&self) -> NoesisResult<Vec<PersistedNodeState>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT path, state FROM node_states ORDER BY path")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut states = Vec::new();
        for row in rows {
            let (path, json) = row?;
            match serde_json::from_str::<PersistedNodeState>(&json) {
                Ok(state) => states.push(state),
                Err(e) => {
                    let err = NoesisError::corrupted(path.as_str(), e);
                    warn!(path = %path, code = err.code().as_str(), error = %err, "Skipping corrupted node state");
                }
            }
        }

        Ok(states)
    }

    /// Delete the state of a document. Returns whether a row was removed.
    pub fn remove_state(&self, path: &str) -> NoesisResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM node_states WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }

    /// Number of stored states.
    pub fn count(&self) -> NoesisResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM node_states", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Store a bookkeeping value.
    pub fn set_meta(&self, key: &str, value: &str) -> NoesisResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> NoesisResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Day the daily decay last ran.
    pub fn last_decay_day(&self) -> NoesisResult<Option<NaiveDate>> {
        Ok(self
            .get_meta(LAST_DECAY_DAY)?
            .and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok()))
    }

    pub fn set_last_decay_day(&self, day: NaiveDate) -> NoesisResult<()> {
        self.set_meta(LAST_DECAY_DAY, &day.format("%Y-%m-%d").to_string())
    }
}

const LAST_DECAY_DAY: &str = "last_decay_day";

fn upsert(conn: &Connection, state: &PersistedNodeState) -> NoesisResult<()> {
    let json = serde_json::to_string(state)?;
    conn.execute(
        "INSERT OR REPLACE INTO node_states (path, node_id, state, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![state.path, state.id, json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{CognitiveStage, MemoryStrengthData, NodeWeight};

    fn state(path: &str) -> PersistedNodeState {
        let now = Utc::now();
        let mut memory = MemoryStrengthData::new();
        memory.push_outcome(true, now);
        PersistedNodeState {
            id: crate::types::node_id(path),
            path: path.to_string(),
            weight: NodeWeight::new(0.5, now),
            links: vec!["other".to_string()],
            next_review_date: Some(now),
            stage: CognitiveStage::Intermediate,
            memory: Some(memory),
        }
    }

    #[test]
    fn test_save_and_get() {
        let store = CognitiveStore::in_memory().unwrap();
        let saved = state("notes/a.md");
        store.save_state(&saved).unwrap();

        let loaded = store.get_state("notes/a.md").unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(store.get_state("missing.md").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = CognitiveStore::in_memory().unwrap();
        let mut s = state("a.md");
        store.save_state(&s).unwrap();
        s.weight.base = 0.75;
        store.save_state(&s).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get_state("a.md").unwrap().unwrap().weight.base, 0.75);
    }

    #[test]
    fn test_save_all_and_remove() {
        let store = CognitiveStore::in_memory().unwrap();
        let written = store
            .save_all(&[state("a.md"), state("b.md"), state("c.md")])
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.load_all().unwrap().len(), 3);

        assert!(store.remove_state("b.md").unwrap());
        assert!(!store.remove_state("b.md").unwrap());
        let paths: Vec<String> = store.load_all().unwrap().into_iter().map(|s| s.path).collect();
        assert_eq!(paths, vec!["a.md".to_string(), "c.md".to_string()]);
    }

    #[test]
    fn test_load_all_skips_corrupt_rows() {
        let store = CognitiveStore::in_memory().unwrap();
        store.save_state(&state("a.md")).unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO node_states (path, node_id, state, updated_at) VALUES ('bad.md', 'bad', '{', '')",
                [],
            )
            .unwrap();

        let states = store.load_all().unwrap();
        assert_eq!(states.len(), 1);
        let err = store.get_state("bad.md").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeCorrupted);
    }

    #[test]
    fn test_last_decay_day() {
        let store = CognitiveStore::in_memory().unwrap();
        assert!(store.last_decay_day().unwrap().is_none());

        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        store.set_last_decay_day(day).unwrap();
        assert_eq!(store.last_decay_day().unwrap(), Some(day));
        assert_eq!(store.get_meta("last_decay_day").unwrap().as_deref(), Some("2025-03-10"));
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");

        {
            let store = CognitiveStore::new(&path).unwrap();
            store.save_state(&state("a.md")).unwrap();
        }

        let reopened = CognitiveStore::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
