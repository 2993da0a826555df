//! One duplicate/contradiction contract shared by the director archive and
//! the background writer.

use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts::{self, Persona};
use symbiosis_core::ChatMessage;
use symbiosis_llm::CompletionClient;
use symbiosis_llm::client::has_text;

/// Context shorter than this is not worth a judge call.
pub const MIN_CONTEXT_CHARS: usize = 20;

const MIN_FACT_CHARS: usize = 5;
const MIN_ENTITY_CHARS: usize = 2;

/// How a candidate fact relates to what is already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactVerdict {
    /// Worth storing, possibly cleaned up.
    New { fact: String, entities: String },
    Duplicate,
    /// Conflicts with an existing record.
    Contradiction(String),
    /// Talk about the conversation, not about anyone's life.
    Meta,
}

/// A fact waiting for a verdict.
#[derive(Debug, Clone, Copy)]
pub struct FactCandidate<'a> {
    pub fact: &'a str,
    pub entities: &'a str,
}

#[derive(Clone)]
pub struct FactJudge {
    client: CompletionClient,
    persona: Persona,
}

impl FactJudge {
    pub fn new(client: CompletionClient, persona: Persona) -> Self {
        Self { client, persona }
    }

    /// Judge `candidate` against existing `context` rows and facts already
    /// `accepted` earlier in the same batch.
    ///
    /// A local normalised match runs first. The model is only consulted when
    /// there is enough context to compare against; without it, or when the
    /// call degrades to safe mode, the fact is treated as new and unchanged.
    pub async fn judge(
        &self,
        candidate: FactCandidate<'_>,
        context: &[String],
        accepted: &[String],
    ) -> FactVerdict {
        if is_local_duplicate(candidate.fact, context, accepted) {
            debug!(fact = candidate.fact, "local duplicate");
            return FactVerdict::Duplicate;
        }

        let unchanged = FactVerdict::New {
            fact: candidate.fact.to_string(),
            entities: candidate.entities.to_string(),
        };
        let joined = context.join("\n");
        if joined.trim().chars().count() <= MIN_CONTEXT_CHARS {
            return unchanged;
        }

        let prompt = prompts::fact_judge(&self.persona, &joined, candidate.fact, candidate.entities);
        let outcome = self
            .client
            .complete(
                vec![ChatMessage::system(prompt)],
                |v: &Value| has_text(v, "status"),
                "fact_judge",
            )
            .await;

        match outcome.parsed() {
            Some(value) => verdict_from(value, candidate),
            None => {
                warn!(fact = candidate.fact, "fact judge unavailable, keeping fact as is");
                unchanged
            }
        }
    }
}

/// Map a judge response onto a verdict. Unknown statuses count as new.
pub fn verdict_from(value: &Value, candidate: FactCandidate<'_>) -> FactVerdict {
    let status = value["status"].as_str().unwrap_or_default().trim().to_uppercase();
    match status.as_str() {
        "DUPLICATE" => FactVerdict::Duplicate,
        "META" => FactVerdict::Meta,
        "CONTRADICTION" => FactVerdict::Contradiction(
            value["warning_message"]
                .as_str()
                .filter(|m| !m.trim().is_empty())
                .map(String::from)
                .unwrap_or_else(|| format!("\"{}\" conflicts with an existing record", candidate.fact)),
        ),
        _ => FactVerdict::New {
            fact: refined(value, "better_fact", MIN_FACT_CHARS).unwrap_or_else(|| candidate.fact.to_string()),
            entities: refined(value, "better_entities", MIN_ENTITY_CHARS)
                .unwrap_or_else(|| candidate.entities.to_string()),
        },
    }
}

fn refined(value: &Value, key: &str, min_chars: usize) -> Option<String> {
    value[key]
        .as_str()
        .map(str::trim)
        .filter(|s| s.chars().count() > min_chars)
        .map(String::from)
}

/// Lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact match against the batch, or a context row that contains the whole
/// fact (rows carry dates and tags around the fact text).
fn is_local_duplicate(fact: &str, context: &[String], accepted: &[String]) -> bool {
    let needle = normalize(fact);
    if needle.is_empty() {
        return false;
    }
    if accepted.iter().any(|a| normalize(a) == needle) {
        return true;
    }
    if needle.split(' ').count() < 3 {
        return false;
    }
    let padded = format!(" {needle} ");
    context
        .iter()
        .any(|row| format!(" {} ", normalize(row)).contains(&padded))
}
