//! Class/session content store with per-class write serialization.

use super::{Class, RecordStore, Session, SessionMeta, Summary};
use crate::error::{LektError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Default accent color for new classes.
const DEFAULT_COLOR: &str = "bg-emerald-500";

/// Keyed storage of classes and their sessions.
///
/// Structural mutations of one class (adding sessions, writing summaries,
/// deleting) hold that class's async lock, so concurrent writers cannot lose
/// each other's session ids. Other classes are never blocked, and reads take
/// no class lock.
pub struct ContentStore {
    records: Arc<dyn RecordStore>,
    class_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ContentStore {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            class_locks: Mutex::new(HashMap::new()),
        }
    }

    fn class_lock(&self, class_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .class_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(class_id.to_string()).or_default().clone()
    }

    /// Create a class. The ID is derived from the name plus a random suffix.
    #[instrument(skip(self))]
    pub async fn create_class(&self, name: &str, code: Option<&str>) -> Result<Class> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LektError::InvalidInput("class name must not be empty".to_string()));
        }

        let id = generate_class_id(name);
        let now = Utc::now();
        let class = Class {
            code: code
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(&id)
                .to_string(),
            id,
            name: name.to_string(),
            color: Some(DEFAULT_COLOR.to_string()),
            created_at: now,
            updated_at: now,
            session_ids: Vec::new(),
            last_session_at: None,
        };

        self.records.put_class(&class).await?;
        info!("Created class {} ({})", class.name, class.id);
        Ok(class)
    }

    /// All classes, oldest first.
    pub async fn list_classes(&self) -> Result<Vec<Class>> {
        self.records.list_classes().await
    }

    /// Fetch a class or fail with `NotFound`.
    pub async fn get_class(&self, class_id: &str) -> Result<Class> {
        self.records
            .get_class(class_id)
            .await?
            .ok_or_else(|| LektError::NotFound(format!("class '{}'", class_id)))
    }

    /// Delete a class together with its sessions.
    #[instrument(skip(self))]
    pub async fn delete_class(&self, class_id: &str) -> Result<()> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        if !self.records.delete_class(class_id).await? {
            return Err(LektError::NotFound(format!("class '{}'", class_id)));
        }

        self.class_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(class_id);
        info!("Deleted class {}", class_id);
        Ok(())
    }

    /// Store a new session under a class.
    ///
    /// Fails with `EmptyContent` for blank content and `NotFound` for an
    /// unknown class. The stored content is byte-for-byte what was given.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn create_session(&self, class_id: &str, title: &str, content: &str) -> Result<Session> {
        self.create_session_with_metadata(class_id, title, content, HashMap::new())
            .await
    }

    /// Store a new session with ingestion metadata attached.
    pub async fn create_session_with_metadata(
        &self,
        class_id: &str,
        title: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Session> {
        if content.trim().is_empty() {
            return Err(LektError::EmptyContent(format!(
                "session '{}' has no text",
                title
            )));
        }

        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        let mut class = self.get_class(class_id).await?;

        let id = loop {
            let candidate = Uuid::new_v4().simple().to_string()[..10].to_string();
            if !class.session_ids.contains(&candidate) {
                break candidate;
            }
        };

        let now = Utc::now();
        let title = match title.trim() {
            "" => format!("Session {}", id),
            t => t.to_string(),
        };
        let session = Session {
            id,
            class_id: class_id.to_string(),
            title,
            created_at: now,
            content: content.to_string(),
            summary: None,
            metadata,
        };

        class.session_ids.push(session.id.clone());
        class.updated_at = now;
        class.last_session_at = Some(now);
        self.records.insert_session(&class, &session).await?;

        info!("Added session {} to class {}", session.id, class_id);
        Ok(session)
    }

    /// Fetch a session or fail with `NotFound`.
    pub async fn get_session(&self, class_id: &str, session_id: &str) -> Result<Session> {
        self.records
            .get_session(class_id, session_id)
            .await?
            .ok_or_else(|| {
                LektError::NotFound(format!("session '{}' in class '{}'", session_id, class_id))
            })
    }

    /// Session metadata in creation order, content elided.
    pub async fn list_sessions(&self, class_id: &str) -> Result<Vec<SessionMeta>> {
        Ok(self
            .class_sessions(class_id)
            .await?
            .iter()
            .map(Session::meta)
            .collect())
    }

    /// Full sessions of a class in creation order.
    pub async fn class_sessions(&self, class_id: &str) -> Result<Vec<Session>> {
        let class = self.get_class(class_id).await?;
        let mut sessions = Vec::with_capacity(class.session_ids.len());

        for session_id in &class.session_ids {
            match self.records.get_session(class_id, session_id).await? {
                Some(session) => sessions.push(session),
                None => debug!("Class {} lists missing session {}", class_id, session_id),
            }
        }

        Ok(sessions)
    }

    /// Overwrite a session's cached summary (last writer wins).
    #[instrument(skip(self, summary))]
    pub async fn set_summary(&self, class_id: &str, session_id: &str, summary: Summary) -> Result<()> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(class_id, session_id).await?;
        session.summary = Some(summary);
        self.records.put_session(&session).await?;

        debug!("Stored summary for session {}", session_id);
        Ok(())
    }
}

/// Slug of the name plus a short random suffix, e.g. `intro-to-cs-3fa9c1`.
fn generate_class_id(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "class".to_string() } else { slug };

    format!("{}-{}", slug, &Uuid::new_v4().simple().to_string()[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use std::collections::HashSet;

    fn store() -> Arc<ContentStore> {
        Arc::new(ContentStore::new(Arc::new(MemoryRecordStore::new())))
    }

    fn summary(point: &str) -> Summary {
        Summary {
            key_points: vec![point.to_string()],
            details: vec![],
            action_items: vec![],
            open_questions: vec![],
            vocabulary: vec![],
            generated_at: Utc::now(),
            provider: "nvidia".to_string(),
            model: "m".to_string(),
        }
    }

    #[test]
    fn test_generate_class_id() {
        let id = generate_class_id("Intro to CS!");
        assert!(id.starts_with("intro-to-cs-"));
        assert_eq!(id.len(), "intro-to-cs-".len() + 6);
        assert!(generate_class_id("!!!").starts_with("class-"));
    }

    #[tokio::test]
    async fn test_session_roundtrip_is_exact() {
        let store = store();
        let class = store.create_class("Intro to CS", Some("CS101")).await.unwrap();
        assert_eq!(class.code, "CS101");

        let session = store
            .create_session(&class.id, "Lecture 1", "hello world")
            .await
            .unwrap();
        let loaded = store.get_session(&class.id, &session.id).await.unwrap();
        assert_eq!(loaded.content, "hello world");
        assert_eq!(loaded.title, "Lecture 1");
    }

    #[tokio::test]
    async fn test_create_session_validation() {
        let store = store();

        let err = store.create_session("nope", "t", "text").await.unwrap_err();
        assert!(matches!(err, LektError::NotFound(_)));

        let class = store.create_class("Physics", None).await.unwrap();
        assert_eq!(class.code, class.id);
        let err = store.create_session(&class.id, "t", "  \n ").await.unwrap_err();
        assert!(matches!(err, LektError::EmptyContent(_)));

        let untitled = store.create_session(&class.id, "", "text").await.unwrap();
        assert_eq!(untitled.title, format!("Session {}", untitled.id));
    }

    #[tokio::test]
    async fn test_concurrent_session_creation() {
        let store = store();
        let class = store.create_class("Concurrency", None).await.unwrap();
        let n = 32;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                let class_id = class.id.clone();
                tokio::spawn(async move {
                    store
                        .create_session(&class_id, &format!("Lecture {}", i), "content")
                        .await
                })
            })
            .collect();

        let mut created = HashSet::new();
        for handle in handles {
            let session = handle.await.unwrap().unwrap();
            created.insert(session.id);
        }

        let listed = store.list_sessions(&class.id).await.unwrap();
        let listed_ids: HashSet<String> = listed.iter().map(|s| s.id.clone()).collect();

        assert_eq!(listed.len(), n);
        assert_eq!(listed_ids.len(), n);
        assert_eq!(listed_ids, created);
    }

    #[tokio::test]
    async fn test_set_summary_overwrites_without_touching_content() {
        let store = store();
        let class = store.create_class("Biology", None).await.unwrap();
        let session = store
            .create_session(&class.id, "Cells", "Mitochondria")
            .await
            .unwrap();

        store
            .set_summary(&class.id, &session.id, summary("first"))
            .await
            .unwrap();
        store
            .set_summary(&class.id, &session.id, summary("second"))
            .await
            .unwrap();

        let loaded = store.get_session(&class.id, &session.id).await.unwrap();
        assert_eq!(loaded.content, "Mitochondria");
        assert_eq!(loaded.summary.unwrap().key_points, vec!["second"]);

        let listed = store.list_sessions(&class.id).await.unwrap();
        assert!(listed[0].has_summary);
    }

    #[tokio::test]
    async fn test_delete_class_removes_sessions() {
        let store = store();
        let class = store.create_class("History", None).await.unwrap();
        let session = store
            .create_session(&class.id, "Rome", "Empire")
            .await
            .unwrap();

        store.delete_class(&class.id).await.unwrap();

        assert!(matches!(
            store.get_session(&class.id, &session.id).await,
            Err(LektError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_class(&class.id).await,
            Err(LektError::NotFound(_))
        ));
        assert!(store.list_classes().await.unwrap().is_empty());
    }
}
