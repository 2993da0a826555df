//! The key-fact store contract.
//!
//! One method per backend action. Implementations return `Err` on transport or
//! storage failure; callers decide whether that degrades to "no context".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use symbiosis_core::{DirectorMemory, MediaFile, MemoryEntry, Result, Role, VisualImage};

/// One persisted chat line, oldest first when returned by `get_recent_chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRow {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
}

/// Result of a `retrieve` call. Each memory is one rendered fact row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub found: bool,
    pub relevant_memories: Vec<String>,
}

impl Retrieval {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<String>) -> Self {
        Self {
            found: !rows.is_empty(),
            relevant_memories: rows,
        }
    }

    /// True when the backend reported a hit and returned at least one row.
    pub fn has_rows(&self) -> bool {
        self.found && !self.relevant_memories.is_empty()
    }

    /// Rows joined one per line.
    pub fn joined(&self) -> String {
        self.relevant_memories.join("\n")
    }
}

/// Result of a `director_search` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSearch {
    pub found: bool,
    #[serde(default)]
    pub files: Vec<MediaFile>,
}

impl MediaSearch {
    /// Drop every file whose name or description mentions an excluded term.
    /// `found` flips to false when filtering empties a non-empty result.
    pub fn exclude(&mut self, excludes: &[String]) {
        if !self.found || excludes.is_empty() {
            return;
        }
        let before = self.files.len();
        let terms: Vec<String> = excludes.iter().map(|e| e.to_lowercase()).collect();
        self.files.retain(|f| {
            let text = f.searchable_text();
            !terms.iter().any(|t| text.contains(t.as_str()))
        });
        if self.files.is_empty() && before > 0 {
            self.found = false;
        }
    }
}

/// The external key-fact memory store.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Recent chat lines for session restore.
    async fn get_recent_chat(&self) -> Result<Vec<ChatRow>>;

    /// Append one chat line.
    async fn log_chat(&self, role: Role, content: &str) -> Result<()>;

    /// Keyword search over stored facts.
    async fn retrieve(&self, keywords: &[String]) -> Result<Retrieval>;

    /// Persist one extracted fact.
    async fn store_atomic(&self, entry: &MemoryEntry) -> Result<()>;

    /// Keyword search over the director archive.
    async fn retrieve_director_memory(&self, keywords: &[String]) -> Result<Vec<DirectorMemory>>;

    /// Persist one director archive fact about `entity`.
    async fn store_director_fact(&self, fact: &str, entity: &str, tags: &str) -> Result<()>;

    /// Media search with include and exclude constraint lists.
    async fn director_search(
        &self,
        query: &str,
        constraints: &[String],
        excludes: &[String],
    ) -> Result<MediaSearch>;

    /// Images linked to one entity.
    async fn search_entity_visuals(&self, entity: &str) -> Result<Vec<VisualImage>>;
}
