//! SQLite-based record store implementation.
//!
//! Records are stored as JSON payloads keyed by class ID and
//! `(class_id, session_id)`, so schema changes to the domain types do not
//! need migrations.

use super::{Class, RecordStore, Session};
use crate::error::{LektError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS classes (
        class_id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        record_json TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        class_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        record_json TEXT NOT NULL,
        PRIMARY KEY (class_id, session_id)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_class_id ON sessions(class_id);
"#;

/// SQLite-based record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) a record store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers from blocking on the writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite record store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite record store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LektError::Storage(format!("Failed to acquire lock: {}", e)))
    }

    fn decode<T: serde::de::DeserializeOwned>(json: &str, key: &str) -> Result<T> {
        serde_json::from_str(json)
            .map_err(|e| LektError::Storage(format!("Corrupt record {}: {}", key, e)))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, class), fields(class_id = %class.id))]
    async fn put_class(&self, class: &Class) -> Result<()> {
        let json = serde_json::to_string(class)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO classes (class_id, created_at, record_json) VALUES (?1, ?2, ?3)",
            params![class.id, class.created_at.to_rfc3339(), json],
        )?;

        debug!("Stored class record");
        Ok(())
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<Class>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM classes WHERE class_id = ?1",
                params![class_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| Self::decode(&j, class_id)).transpose()
    }

    async fn list_classes(&self) -> Result<Vec<Class>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT class_id, record_json FROM classes ORDER BY created_at, class_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut classes = Vec::new();
        for row in rows {
            let (class_id, json) = row?;
            classes.push(Self::decode(&json, &class_id)?);
        }
        Ok(classes)
    }

    #[instrument(skip(self))]
    async fn delete_class(&self, class_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let sessions = tx.execute("DELETE FROM sessions WHERE class_id = ?1", params![class_id])?;
        let classes = tx.execute("DELETE FROM classes WHERE class_id = ?1", params![class_id])?;
        tx.commit()?;

        info!("Deleted class {} with {} session records", class_id, sessions);
        Ok(classes > 0)
    }

    #[instrument(skip(self, class, session), fields(class_id = %class.id, session_id = %session.id))]
    async fn insert_session(&self, class: &Class, session: &Session) -> Result<()> {
        let session_json = serde_json::to_string(session)?;
        let class_json = serde_json::to_string(class)?;
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO sessions (class_id, session_id, record_json) VALUES (?1, ?2, ?3)",
            params![session.class_id, session.id, session_json],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO classes (class_id, created_at, record_json) VALUES (?1, ?2, ?3)",
            params![class.id, class.created_at.to_rfc3339(), class_json],
        )?;
        tx.commit()?;

        debug!("Stored session and class records");
        Ok(())
    }

    #[instrument(skip(self, session), fields(class_id = %session.class_id, session_id = %session.id))]
    async fn put_session(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO sessions (class_id, session_id, record_json) VALUES (?1, ?2, ?3)",
            params![session.class_id, session.id, json],
        )?;

        debug!("Stored session record");
        Ok(())
    }

    async fn get_session(&self, class_id: &str, session_id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM sessions WHERE class_id = ?1 AND session_id = ?2",
                params![class_id, session_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| Self::decode(&j, &format!("{}/{}", class_id, session_id)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Summary;
    use chrono::Utc;

    fn class(id: &str) -> Class {
        let now = Utc::now();
        Class {
            id: id.to_string(),
            name: "Data Structures".to_string(),
            code: "CS201".to_string(),
            color: Some("bg-emerald-500".to_string()),
            created_at: now,
            updated_at: now,
            session_ids: Vec::new(),
            last_session_at: None,
        }
    }

    fn session(class_id: &str, id: &str) -> Session {
        Session {
            id: id.to_string(),
            class_id: class_id.to_string(),
            title: "Hash tables".to_string(),
            created_at: Utc::now(),
            content: "Buckets and probing".to_string(),
            summary: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_record_store() {
        let store = SqliteRecordStore::in_memory().unwrap();

        store.put_class(&class("cs201")).await.unwrap();
        store.put_session(&session("cs201", "s1")).await.unwrap();
        store.put_session(&session("cs201", "s2")).await.unwrap();

        let classes = store.list_classes().await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].code, "CS201");

        let loaded = store.get_session("cs201", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.content, "Buckets and probing");

        assert!(store.delete_class("cs201").await.unwrap());
        assert!(store.get_class("cs201").await.unwrap().is_none());
        assert!(store.get_session("cs201", "s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lekt.db");

        let mut cs201 = class("cs201");
        let mut written = session("cs201", "s1");
        written.summary = Some(Summary {
            key_points: vec!["Open addressing tries the next free slot".to_string()],
            details: vec![],
            action_items: vec![],
            open_questions: vec![],
            vocabulary: vec![],
            generated_at: Utc::now(),
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
        });

        {
            let store = SqliteRecordStore::new(&path).unwrap();
            store.put_class(&cs201).await.unwrap();
            cs201.session_ids.push(written.id.clone());
            store.insert_session(&cs201, &written).await.unwrap();
        }

        let reopened = SqliteRecordStore::new(&path).unwrap();
        assert_eq!(reopened.get_class("cs201").await.unwrap(), Some(cs201));
        assert_eq!(reopened.get_session("cs201", "s1").await.unwrap(), Some(written));
    }

    #[tokio::test]
    async fn test_insert_session_is_all_or_nothing() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let mut cs201 = class("cs201");
        store.put_class(&cs201).await.unwrap();

        let first = session("cs201", "s1");
        cs201.session_ids.push(first.id.clone());
        store.insert_session(&cs201, &first).await.unwrap();
        assert_eq!(store.get_class("cs201").await.unwrap().unwrap().session_ids, vec!["s1"]);

        // Class write fails: the session insert must roll back with it
        store
            .lock()
            .unwrap()
            .execute_batch("ALTER TABLE classes RENAME TO classes_gone")
            .unwrap();
        let second = session("cs201", "s2");
        cs201.session_ids.push(second.id.clone());
        assert!(store.insert_session(&cs201, &second).await.is_err());
        assert!(store.get_session("cs201", "s2").await.unwrap().is_none());
    }
}
