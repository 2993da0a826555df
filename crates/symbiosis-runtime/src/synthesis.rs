use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts::{self, Persona};
use symbiosis_core::{ChatHistory, ChatMessage, MemoryEntry, split_tags};
use symbiosis_llm::CompletionClient;

/// History characters shown to the synthesis call.
const HISTORY_CHARS: usize = 800;

/// What one synthesis pass extracted from the user's input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    pub search_keywords: Vec<String>,
    pub entries: Vec<MemoryEntry>,
}

/// Turns one utterance into search keywords and candidate memory entries.
#[derive(Clone)]
pub struct Synthesizer {
    client: CompletionClient,
    persona: Persona,
}

impl Synthesizer {
    pub fn new(client: CompletionClient, persona: Persona) -> Self {
        Self { client, persona }
    }

    pub async fn analyze(
        &self,
        input: &str,
        history: &ChatHistory,
        pending_fact: Option<&str>,
        today: NaiveDate,
    ) -> Synthesis {
        let prompt = prompts::synthesis(
            &self.persona,
            today,
            &history.transcript_tail(HISTORY_CHARS),
            pending_fact,
            input,
        );
        let outcome = self
            .client
            .complete(vec![ChatMessage::system(prompt)], keywords_present, "synthesis")
            .await;

        let Some(value) = outcome.parsed() else {
            warn!("synthesis unavailable, continuing without extraction");
            return Synthesis::default();
        };
        let synthesis = parse_synthesis(value);
        debug!(
            keywords = ?synthesis.search_keywords,
            entries = synthesis.entries.len(),
            "synthesis complete"
        );
        synthesis
    }
}

/// `search_keywords` may come back as an array or a comma-joined string.
fn keywords_present(value: &Value) -> bool {
    matches!(
        value.get("search_keywords"),
        Some(Value::Array(_)) | Some(Value::String(_))
    )
}

/// Lenient read of a synthesis response. Malformed entries are skipped.
pub fn parse_synthesis(value: &Value) -> Synthesis {
    let search_keywords = match value.get("search_keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_tags(s),
        _ => vec![],
    };
    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value::<MemoryEntry>(v.clone()).ok())
                .filter(|e| !e.is_blank())
                .collect()
        })
        .unwrap_or_default();
    Synthesis {
        search_keywords,
        entries,
    }
}
