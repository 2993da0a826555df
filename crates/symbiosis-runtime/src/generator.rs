use serde_json::Value;
use tracing::debug;

use crate::prompts;
use symbiosis_core::{ChatHistory, ChatMessage, KnowledgeGraph, Mood};
use symbiosis_llm::CompletionClient;
use symbiosis_llm::client::has_text;
use symbiosis_memory::Retrieval;

const HISTORY_CHARS: usize = 800;

/// Everything the final generation call is grounded on.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub input: &'a str,
    pub memory: &'a Retrieval,
    pub history: &'a ChatHistory,
    pub interrogation: bool,
    /// Arms the attention audit protocol in standard mode.
    pub ghost_audit: bool,
}

/// A sanitized candidate reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub response: String,
    pub mood: Mood,
    pub graph: KnowledgeGraph,
}

#[derive(Clone)]
pub struct ResponseGenerator {
    client: CompletionClient,
}

impl ResponseGenerator {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    pub async fn generate(&self, req: GenerationRequest<'_>) -> Generated {
        let memory = memory_block(req.memory);
        let rules = if req.interrogation {
            prompts::interrogation_rules().to_string()
        } else {
            prompts::standard_rules(req.ghost_audit)
        };
        let prompt = prompts::generation(
            &memory,
            &req.history.transcript_tail(HISTORY_CHARS),
            req.input,
            &rules,
        );

        let value = self
            .client
            .complete(
                vec![ChatMessage::system(prompt)],
                |v: &Value| has_text(v, "response") && has_text(v, "mood"),
                "generation",
            )
            .await
            .into_value();

        let context = format!(
            "{}\n{}\n{}",
            req.memory.joined(),
            req.history.transcript(),
            req.input
        );
        let graph = KnowledgeGraph::from_response(&value).sanitize(&context);
        let generated = Generated {
            response: value["response"].as_str().unwrap_or("...").to_string(),
            mood: Mood::from_value(value.get("mood")),
            graph,
        };
        debug!(mood = %generated.mood, roots = generated.graph.roots.len(), "reply generated");
        generated
    }
}

fn memory_block(memory: &Retrieval) -> String {
    if memory.has_rows() {
        format!("=== DATABASE SEARCH RESULTS ===\n{}", memory.joined())
    } else {
        "=== DATABASE SEARCH RESULTS ===\n(no matching memories)".to_string()
    }
}
