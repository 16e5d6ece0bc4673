//! In-memory record store implementation.
//!
//! Useful for testing and throwaway runs.

use super::{Class, RecordStore, Session};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory record store.
pub struct MemoryRecordStore {
    classes: RwLock<HashMap<String, Class>>,
    sessions: RwLock<HashMap<(String, String), Session>>,
}

impl MemoryRecordStore {
    /// Create a new in-memory record store.
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put_class(&self, class: &Class) -> Result<()> {
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        classes.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<Class>> {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(classes.get(class_id).cloned())
    }

    async fn list_classes(&self) -> Result<Vec<Class>> {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<Class> = classes.values().cloned().collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn delete_class(&self, class_id: &str) -> Result<bool> {
        let removed = self
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(class_id)
            .is_some();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(owner, _), _| owner != class_id);
        Ok(removed)
    }

    async fn insert_session(&self, class: &Class, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(
            (session.class_id.clone(), session.id.clone()),
            session.clone(),
        );
        classes.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn put_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(
            (session.class_id.clone(), session.id.clone()),
            session.clone(),
        );
        Ok(())
    }

    async fn get_session(&self, class_id: &str, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .get(&(class_id.to_string(), session_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_record_store() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();

        let class = Class {
            id: "cs101-abc123".to_string(),
            name: "Intro to CS".to_string(),
            code: "CS101".to_string(),
            color: None,
            created_at: now,
            updated_at: now,
            session_ids: vec!["s1".to_string()],
            last_session_at: Some(now),
        };
        store.put_class(&class).await.unwrap();

        let session = Session {
            id: "s1".to_string(),
            class_id: class.id.clone(),
            title: "Lecture 1".to_string(),
            created_at: now,
            content: "Lists and dicts".to_string(),
            summary: None,
            metadata: Default::default(),
        };
        store.put_session(&session).await.unwrap();

        assert_eq!(store.get_class(&class.id).await.unwrap(), Some(class.clone()));
        assert_eq!(
            store.get_session(&class.id, "s1").await.unwrap(),
            Some(session)
        );
        assert!(store.get_session("other", "s1").await.unwrap().is_none());

        assert!(store.delete_class(&class.id).await.unwrap());
        assert!(store.get_session(&class.id, "s1").await.unwrap().is_none());
        assert!(!store.delete_class(&class.id).await.unwrap());
    }
}
