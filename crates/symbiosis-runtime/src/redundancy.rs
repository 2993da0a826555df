use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::generator::Generated;
use crate::prompts;
use symbiosis_core::{ChatMessage, Mood};
use symbiosis_llm::CompletionClient;
use symbiosis_llm::client::{has_bool, has_text};
use symbiosis_memory::MemoryRetriever;
use symbiosis_memory::retriever::dedup_keywords;

const QUESTION_STOPWORDS: &[&str] = &[
    "what", "when", "where", "who", "why", "does", "this", "that", "have", "your", "about",
];

const ABANDON_TOPIC: &str = "ABORT TOPIC. The user does not know this. Switch to a completely NEW subject (e.g. Work, Food, or a different Person).";
const DIG_DEEPER: &str = "STAY ON TOPIC. We already know that detail, so ask a DIFFERENT, deeper question about the SAME subject. Do not abandon the entity yet.";

/// Why a candidate question was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedundancyReason {
    Known,
    DeadEnd,
    Repeat,
    None,
}

impl RedundancyReason {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "KNOWN" => Self::Known,
            "DEAD_END" => Self::DeadEnd,
            "REPEAT" => Self::Repeat,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Known => "KNOWN",
            Self::DeadEnd => "DEAD_END",
            Self::Repeat => "REPEAT",
            Self::None => "NONE",
        }
    }

    fn strategy(&self) -> &'static str {
        match self {
            Self::DeadEnd => ABANDON_TOPIC,
            _ => DIG_DEEPER,
        }
    }
}

/// Re-checks an interrogation question against memory before it is asked.
pub struct RedundancyGuard {
    client: CompletionClient,
    retriever: Arc<MemoryRetriever>,
}

impl RedundancyGuard {
    pub fn new(client: CompletionClient, retriever: Arc<MemoryRetriever>) -> Self {
        Self { client, retriever }
    }

    /// Return `candidate`, or one corrected replacement if it asks for
    /// something memory already holds.
    pub async fn review(&self, candidate: Generated, search_keywords: &[String]) -> Generated {
        let mut keys = question_keywords(&candidate.response);
        if keys.is_empty() {
            return candidate;
        }
        keys.extend(search_keywords.iter().cloned());
        let keys = dedup_keywords(keys);

        let memory = self.retriever.retrieve(&keys).await;
        if !memory.has_rows() {
            return candidate;
        }
        let memory = memory.joined();

        let audit = self
            .client
            .complete(
                vec![ChatMessage::system(prompts::redundancy(&candidate.response, &memory))],
                |v: &Value| has_bool(v, "is_redundant"),
                "redundancy_check",
            )
            .await;
        let Some(verdict) = audit.parsed() else {
            return candidate;
        };
        if verdict["is_redundant"].as_bool() != Some(true) {
            debug!("question is not redundant");
            return candidate;
        }

        let reason = RedundancyReason::parse(verdict["reason"].as_str().unwrap_or_default());
        info!(reason = reason.as_str(), question = %candidate.response, "redundant question, regenerating");

        let prompt = prompts::correction(&candidate.response, reason.as_str(), &memory, reason.strategy());
        let corrected = self
            .client
            .complete(
                vec![ChatMessage::system(prompt)],
                |v: &Value| has_text(v, "response"),
                "redundancy_correction",
            )
            .await;
        match corrected.parsed() {
            Some(v) => Generated {
                response: v["response"].as_str().unwrap_or_default().to_string(),
                mood: v
                    .get("mood")
                    .map(|m| Mood::from_value(Some(m)))
                    .unwrap_or(Mood::Curious),
                graph: candidate.graph,
            },
            None => candidate,
        }
    }
}

/// Content words of a question: alphabetic, longer than two letters,
/// interrogatives and fillers removed.
pub fn question_keywords(question: &str) -> Vec<String> {
    question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() > 2 && w.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|w| !QUESTION_STOPWORDS.contains(&w.to_lowercase().as_str()))
        .map(String::from)
        .collect()
}
