use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::{ChatRow, MediaSearch, MemoryBackend, Retrieval};
use symbiosis_core::{
    DirectorMemory, MemoryEntry, Result, Role, SymbiosisError, VisualImage,
};

/// Remote fact store reached by POSTing `{ "action": ..., ... }` to one URL.
pub struct HttpMemoryBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpMemoryBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, body: Value) -> Result<Value> {
        let action = body["action"].as_str().unwrap_or("unknown").to_string();
        debug!(%action, "memory backend request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SymbiosisError::Memory(format!("{action}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SymbiosisError::Memory(format!(
                "{action}: HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| SymbiosisError::Memory(format!("{action}: invalid JSON: {e}")))
    }

    /// Fire an action whose response body is irrelevant.
    async fn send(&self, body: Value) -> Result<()> {
        self.call(body).await.map(|_| ())
    }
}

fn found(data: &Value) -> bool {
    data["found"].as_bool().unwrap_or(false)
}

/// History rows arrive as `[timestamp, role, content]` triples or as objects.
pub(crate) fn parse_chat_row(row: &Value) -> Option<ChatRow> {
    let (ts, role, content) = match row {
        Value::Array(cells) if cells.len() >= 3 => (
            cells[0].as_str()?,
            cells[1].as_str()?,
            cells[2].as_str()?,
        ),
        Value::Object(_) => (
            row["timestamp"].as_str()?,
            row["role"].as_str()?,
            row["content"].as_str()?,
        ),
        _ => return None,
    };
    Some(ChatRow {
        timestamp: DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc),
        role: Role::parse(role)?,
        content: content.to_string(),
    })
}

/// Director rows are usually `{Entity, Fact}` objects; bare strings are kept
/// as facts with no entity.
pub(crate) fn parse_director_row(row: &Value) -> Option<DirectorMemory> {
    match row {
        Value::String(s) => Some(DirectorMemory {
            entity: String::new(),
            fact: s.clone(),
        }),
        Value::Object(_) => serde_json::from_value(row.clone()).ok(),
        _ => None,
    }
}

#[async_trait]
impl MemoryBackend for HttpMemoryBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_recent_chat(&self) -> Result<Vec<ChatRow>> {
        let data = self.call(json!({ "action": "get_recent_chat" })).await?;
        Ok(data["history"]
            .as_array()
            .map(|rows| rows.iter().filter_map(parse_chat_row).collect())
            .unwrap_or_default())
    }

    async fn log_chat(&self, role: Role, content: &str) -> Result<()> {
        self.send(json!({ "action": "log_chat", "role": role.as_str(), "content": content }))
            .await
    }

    async fn retrieve(&self, keywords: &[String]) -> Result<Retrieval> {
        let data = self
            .call(json!({ "action": "retrieve", "keywords": keywords }))
            .await?;
        let rows: Vec<String> = data["relevant_memories"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        Ok(Retrieval {
            found: found(&data) && !rows.is_empty(),
            relevant_memories: rows,
        })
    }

    async fn store_atomic(&self, entry: &MemoryEntry) -> Result<()> {
        self.send(json!({
            "action": "store_atomic",
            "fact": entry.fact,
            "entities": entry.entities,
            "topics": entry.topics,
            "importance": entry.importance,
        }))
        .await
    }

    async fn retrieve_director_memory(&self, keywords: &[String]) -> Result<Vec<DirectorMemory>> {
        let data = self
            .call(json!({ "action": "retrieve_director_memory", "keywords": keywords }))
            .await?;
        if !found(&data) {
            return Ok(vec![]);
        }
        Ok(data["relevant_memories"]
            .as_array()
            .map(|rows| rows.iter().filter_map(parse_director_row).collect())
            .unwrap_or_default())
    }

    async fn store_director_fact(&self, fact: &str, entity: &str, tags: &str) -> Result<()> {
        self.send(json!({
            "action": "store_director_fact",
            "fact": fact,
            "entity": entity,
            "tags": tags,
        }))
        .await
    }

    async fn director_search(
        &self,
        query: &str,
        constraints: &[String],
        excludes: &[String],
    ) -> Result<MediaSearch> {
        let data = self
            .call(json!({
                "action": "director_search",
                "query": query,
                "constraints": constraints,
                "exclude_constraints": excludes,
            }))
            .await?;
        let files = match data.get("files") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => vec![],
        };
        Ok(MediaSearch {
            found: found(&data),
            files,
        })
    }

    async fn search_entity_visuals(&self, entity: &str) -> Result<Vec<VisualImage>> {
        let data = self
            .call(json!({ "action": "search_entity_visuals", "entityName": entity }))
            .await?;
        if !found(&data) {
            return Ok(vec![]);
        }
        match data.get("images") {
            Some(v) => Ok(serde_json::from_value(v.clone())?),
            None => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_row_from_triple() {
        let row = json!(["2025-01-30T10:00:00Z", "user", "hello"]);
        let parsed = parse_chat_row(&row).unwrap();
        assert_eq!(parsed.role, Role::User);
        assert_eq!(parsed.content, "hello");
    }

    #[test]
    fn test_chat_row_rejects_bad_timestamp() {
        assert!(parse_chat_row(&json!(["yesterday", "user", "hi"])).is_none());
        assert!(parse_chat_row(&json!(["2025-01-30T10:00:00Z", "robot", "hi"])).is_none());
    }

    #[test]
    fn test_director_row_variants() {
        let obj = parse_director_row(&json!({"Entity": "Alex", "Fact": "likes tea"})).unwrap();
        assert_eq!(obj.entity, "Alex");
        let bare = parse_director_row(&json!("Sam paints")).unwrap();
        assert!(bare.entity.is_empty());
        assert_eq!(bare.fact, "Sam paints");
    }
}
