use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::backend::{ChatRow, MediaSearch, MemoryBackend, Retrieval};
use symbiosis_core::{
    DirectorMemory, MediaFile, MemoryEntry, Result, Role, SymbiosisError, VisualImage,
    format_fact_date,
};

/// Rows returned per keyword search.
pub const RETRIEVE_LIMIT: usize = 20;
/// Chat lines returned by `get_recent_chat`.
pub const RECENT_CHAT_LIMIT: usize = 10;

fn db_err(e: rusqlite::Error) -> SymbiosisError {
    SymbiosisError::Memory(e.to_string())
}

/// Local fact store backed by SQLite. Used when no remote backend is
/// configured, and as the in-memory store in tests.
pub struct SqliteMemoryBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteMemoryBackend {
    /// Open or create the fact database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening fact store");

        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chat_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY,
                fact TEXT NOT NULL,
                entities TEXT NOT NULL DEFAULT '',
                topics TEXT NOT NULL DEFAULT '',
                importance INTEGER NOT NULL DEFAULT 5,
                recorded_on TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS director_facts (
                id TEXT PRIMARY KEY,
                entity TEXT NOT NULL,
                fact TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mime TEXT NOT NULL,
                url TEXT NOT NULL,
                thumbnail TEXT,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS visuals (
                id TEXT PRIMARY KEY,
                entity TEXT NOT NULL,
                url TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_director_entity ON director_facts(entity);
            CREATE INDEX IF NOT EXISTS idx_visuals_entity ON visuals(entity);
            ",
        )
        .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Persist a fact as recorded on `date`.
    pub fn store_atomic_on(&self, entry: &MemoryEntry, date: NaiveDate) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO facts (id, fact, entities, topics, importance, recorded_on, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                entry.fact,
                entry.entities,
                entry.topics,
                entry.importance as i64,
                date.format("%Y-%m-%d").to_string(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Append a chat line with an explicit timestamp.
    pub fn log_chat_at(&self, role: Role, content: &str, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO chat_log (timestamp, role, content) VALUES (?1, ?2, ?3)",
            rusqlite::params![at.to_rfc3339(), role.as_str(), content],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Register a media file in the archive.
    pub fn add_media(&self, file: &MediaFile) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO media (id, name, mime, url, thumbnail, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                file.name,
                file.mime,
                file.url,
                file.thumbnail,
                file.description,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Link an image to an entity deck.
    pub fn add_visual(&self, entity: &str, url: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO visuals (id, entity, url) VALUES (?1, ?2, ?3)",
            rusqlite::params![Uuid::new_v4().to_string(), entity, url],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Number of persisted facts.
    pub fn fact_count(&self) -> Result<usize> {
        let db = self.db.lock();
        let n: i64 = db
            .query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(n as usize)
    }

    /// Every persisted fact text, oldest first.
    pub fn all_facts(&self) -> Result<Vec<MemoryEntry>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT fact, entities, topics, importance FROM facts ORDER BY rowid")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MemoryEntry::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?.clamp(1, 10) as u8,
                ))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Every director archive row, oldest first.
    pub fn all_director_facts(&self) -> Result<Vec<DirectorMemory>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT entity, fact FROM director_facts ORDER BY rowid")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DirectorMemory {
                    entity: row.get(0)?,
                    fact: row.get(1)?,
                })
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

/// Lowercased keywords longer than two characters, deduplicated.
fn search_terms(keywords: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for k in keywords {
        let t = k.trim().to_lowercase();
        if t.len() > 2 && !terms.contains(&t) {
            terms.push(t);
        }
    }
    terms
}

/// Number of `terms` contained in `haystack` (already lowercased).
fn hits(haystack: &str, terms: &[String]) -> usize {
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

/// One fact row as the generator sees it: date prefix, text, then tags.
fn render_fact(fact: &str, entities: &str, topics: &str, importance: i64, recorded_on: &str) -> String {
    let date = NaiveDate::parse_from_str(recorded_on, "%Y-%m-%d")
        .map(format_fact_date)
        .unwrap_or_else(|_| recorded_on.to_string());
    format!("[{date}] {fact} (Entities: {entities}; Topics: {topics}; Importance: {importance})")
}

#[async_trait]
impl MemoryBackend for SqliteMemoryBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_recent_chat(&self) -> Result<Vec<ChatRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT timestamp, role, content FROM chat_log ORDER BY id DESC LIMIT ?1")
            .map_err(db_err)?;
        let mut rows: Vec<ChatRow> = stmt
            .query_map(rusqlite::params![RECENT_CHAT_LIMIT as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter_map(|(ts, role, content)| {
                Some(ChatRow {
                    timestamp: DateTime::parse_from_rfc3339(&ts).ok()?.with_timezone(&Utc),
                    role: Role::parse(&role)?,
                    content,
                })
            })
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn log_chat(&self, role: Role, content: &str) -> Result<()> {
        self.log_chat_at(role, content, Utc::now())
    }

    async fn retrieve(&self, keywords: &[String]) -> Result<Retrieval> {
        let terms = search_terms(keywords);
        if terms.is_empty() {
            return Ok(Retrieval::empty());
        }

        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT fact, entities, topics, importance, recorded_on FROM facts")
            .map_err(db_err)?;
        let mut scored: Vec<(usize, i64, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter_map(|(fact, entities, topics, importance, recorded_on)| {
                let haystack = format!("{fact} {entities} {topics}").to_lowercase();
                let score = hits(&haystack, &terms);
                (score > 0).then(|| {
                    (
                        score,
                        importance,
                        render_fact(&fact, &entities, &topics, importance, &recorded_on),
                    )
                })
            })
            .collect();

        // Most keyword hits first, then most important.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored.truncate(RETRIEVE_LIMIT);

        Ok(Retrieval::from_rows(scored.into_iter().map(|(_, _, row)| row).collect()))
    }

    /// Stamped with the local calendar day, the same day turns are resolved
    /// against, so same-day lookups find it.
    async fn store_atomic(&self, entry: &MemoryEntry) -> Result<()> {
        self.store_atomic_on(entry, Local::now().date_naive())
    }

    async fn retrieve_director_memory(&self, keywords: &[String]) -> Result<Vec<DirectorMemory>> {
        let terms = search_terms(keywords);
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let rows = self.all_director_facts()?;
        let mut scored: Vec<(usize, DirectorMemory)> = rows
            .into_iter()
            .filter_map(|m| {
                let haystack = format!("{} {}", m.entity, m.fact).to_lowercase();
                let score = hits(&haystack, &terms);
                (score > 0).then_some((score, m))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(RETRIEVE_LIMIT)
            .map(|(_, m)| m)
            .collect())
    }

    async fn store_director_fact(&self, fact: &str, entity: &str, tags: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO director_facts (id, entity, fact, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                entity,
                fact,
                tags,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn director_search(
        &self,
        query: &str,
        constraints: &[String],
        excludes: &[String],
    ) -> Result<MediaSearch> {
        // Every constraint must match; with none, fall back to any query word.
        let required = search_terms(constraints);
        let loose: Vec<String> = if required.is_empty() {
            let words: Vec<String> = query.split_whitespace().map(String::from).collect();
            search_terms(&words)
        } else {
            vec![]
        };

        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT name, mime, url, thumbnail, description FROM media ORDER BY rowid")
            .map_err(db_err)?;
        let files: Vec<MediaFile> = stmt
            .query_map([], |row| {
                Ok(MediaFile {
                    name: row.get(0)?,
                    mime: row.get(1)?,
                    url: row.get(2)?,
                    thumbnail: row.get(3)?,
                    description: row.get(4)?,
                })
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter(|f| {
                let text = f.searchable_text();
                if required.is_empty() {
                    hits(&text, &loose) > 0
                } else {
                    hits(&text, &required) == required.len()
                }
            })
            .collect();

        let mut result = MediaSearch {
            found: !files.is_empty(),
            files,
        };
        result.exclude(excludes);
        Ok(result)
    }

    async fn search_entity_visuals(&self, entity: &str) -> Result<Vec<VisualImage>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT url FROM visuals WHERE lower(entity) = lower(?1) ORDER BY rowid")
            .map_err(db_err)?;
        let images = stmt
            .query_map(rusqlite::params![entity.trim()], |row| {
                Ok(VisualImage { url: row.get(0)? })
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fact_uses_fact_date_format() {
        let row = render_fact("Alex likes tea", "Alex", "Food", 5, "2025-01-29");
        assert!(row.starts_with("[Jan 29, 2025] Alex likes tea"));
        assert!(row.contains("Importance: 5"));
    }

    #[test]
    fn test_search_terms_drop_short_and_duplicates() {
        let terms = search_terms(&["Al".into(), "Tea".into(), "tea".into(), "Sam".into()]);
        assert_eq!(terms, vec!["tea".to_string(), "sam".to_string()]);
    }
}
