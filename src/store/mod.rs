//! Class and session storage for Lekt.
//!
//! [`ContentStore`] owns the domain rules (ids, ownership, per-class write
//! serialization). Durable storage is delegated to a [`RecordStore`], a plain
//! key-value interface with in-memory and SQLite backends.

mod content;
mod memory;
mod sqlite;

pub use content::ContentStore;
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user-defined grouping of sessions, such as a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    /// Unique, immutable class ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short course code (e.g., "CS101").
    pub code: String,
    /// UI accent color.
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Session IDs in creation order.
    pub session_ids: Vec<String>,
    /// When the most recent session was added.
    pub last_session_at: Option<DateTime<Utc>>,
}

/// One ingested unit of content: a lecture transcript or extracted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID, unique within its class.
    pub id: String,
    /// Owning class.
    pub class_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Normalized text. Never modified after creation.
    pub content: String,
    /// Cached summary, replaced only by regeneration.
    pub summary: Option<Summary>,
    /// Free-form ingestion metadata (source file name, language, ...).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Session {
    /// Listing view without the content.
    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            id: self.id.clone(),
            class_id: self.class_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            content_chars: self.content.chars().count(),
            has_summary: self.summary.is_some(),
        }
    }
}

/// Session metadata for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub content_chars: usize,
    pub has_summary: bool,
}

/// Structured digest of a session, always regenerable from its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Most important points.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Supporting details, definitions and examples.
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Provider identity that produced this summary.
    pub provider: String,
    pub model: String,
}

impl Summary {
    /// Render as Markdown, skipping empty sections.
    pub fn to_markdown(&self) -> String {
        let sections = [
            ("Key Points", &self.key_points),
            ("Details", &self.details),
            ("Action Items", &self.action_items),
            ("Open Questions", &self.open_questions),
            ("Vocabulary", &self.vocabulary),
        ];

        sections
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(heading, items)| {
                let bullets: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
                format!("## {}\n{}", heading, bullets.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// True when every section is empty.
    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty()
            && self.details.is_empty()
            && self.action_items.is_empty()
            && self.open_questions.is_empty()
            && self.vocabulary.is_empty()
    }
}

/// Durable key-value storage for class and session records.
///
/// Keys are `class_id` for classes and `(class_id, session_id)` for sessions.
/// A completed write must survive a restart.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a class record.
    async fn put_class(&self, class: &Class) -> Result<()>;

    /// Fetch a class record.
    async fn get_class(&self, class_id: &str) -> Result<Option<Class>>;

    /// All class records, oldest first.
    async fn list_classes(&self) -> Result<Vec<Class>>;

    /// Remove a class record and every session record under it.
    async fn delete_class(&self, class_id: &str) -> Result<bool>;

    /// Store a new session together with its updated class record.
    ///
    /// Either both records are written or neither is.
    async fn insert_session(&self, class: &Class, session: &Session) -> Result<()>;

    /// Insert or replace a session record.
    async fn put_session(&self, session: &Session) -> Result<()>;

    /// Fetch a session record.
    async fn get_session(&self, class_id: &str, session_id: &str) -> Result<Option<Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Summary {
        Summary {
            key_points: vec!["Recursion needs a base case".to_string()],
            details: vec![],
            action_items: vec!["Read chapter 3".to_string()],
            open_questions: vec![],
            vocabulary: vec![],
            generated_at: Utc::now(),
            provider: "nvidia".to_string(),
            model: "m".to_string(),
        }
    }

    #[test]
    fn test_summary_markdown_skips_empty_sections() {
        let markdown = summary().to_markdown();
        assert_eq!(
            markdown,
            "## Key Points\n- Recursion needs a base case\n\n## Action Items\n- Read chapter 3"
        );
    }

    #[test]
    fn test_session_meta_counts_chars() {
        let session = Session {
            id: "s1".to_string(),
            class_id: "c1".to_string(),
            title: "Intro".to_string(),
            created_at: Utc::now(),
            content: "héllo".to_string(),
            summary: Some(summary()),
            metadata: HashMap::new(),
        };

        let meta = session.meta();
        assert_eq!(meta.content_chars, 5);
        assert!(meta.has_summary);
    }
}
