//! Director mode: one classification call, then STORE, SEARCH, or CHAT.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::dedup::{FactCandidate, FactJudge, FactVerdict};
use crate::prompts;
use symbiosis_core::{ChatHistory, ChatMessage, DirectorMemory, Intent, Mood, Role, TurnReply};
use symbiosis_llm::CompletionClient;
use symbiosis_llm::client::{has_array, has_text};
use symbiosis_memory::{MediaSearch, MemoryRetriever};

/// Default cap on second-pass drill-down entities.
pub const DEFAULT_DRILL_DOWN_LIMIT: usize = 15;

const CLASSIFIER_HISTORY_CHARS: usize = 800;
const FILTER_HISTORY_CHARS: usize = 600;
const NARRATOR_HISTORY_CHARS: usize = 300;
/// Inputs shorter than this many words get the intent bridge.
const BRIDGE_MAX_WORDS: usize = 5;
const DIRECTOR_FACT_TAGS: &str = "Metadata";

const BRIDGE_PRONOUNS: &[&str] = &["he", "him", "she", "her", "it", "them", "that", "those"];
const BRIDGE_EXCLUDED: &[&str] = &[
    "The", "A", "An", "I", "He", "She", "It", "They", "We", "Who", "What", "Where", "When",
];
const DECK_STOPWORDS: &[&str] = &[
    "Tell", "Me", "About", "Who", "Is", "What", "Where", "When", "How", "Why", "The", "A", "An",
    "And", "Or", "But", "No", "Yes", "Compare", "Him", "Her", "Them", "With", "Any", "Guys",
];

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+").expect("valid capitalized-word regex"));
static FULL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-zA-Z]+(?:\s[A-Z][a-zA-Z]+)?").expect("valid full-name regex"));

/// The classifier's reading of one director turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorPlan {
    pub intent: Option<Intent>,
    pub facts: Vec<String>,
    pub entity_name: String,
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub response: String,
}

impl DirectorPlan {
    /// Lenient read; missing or mistyped fields become empty.
    pub fn from_value(value: &Value) -> Self {
        let mut facts = strings(value, "facts");
        if facts.is_empty() {
            facts = strings(value, "fact_to_store");
        }
        Self {
            intent: value["intent"].as_str().and_then(Intent::parse),
            facts,
            entity_name: text(value, "entity_name"),
            positive: strings(value, "positive_constraints"),
            negative: strings(value, "negative_constraints"),
            response: text(value, "response"),
        }
    }
}

fn text(value: &Value, key: &str) -> String {
    value[key].as_str().map(|s| s.trim().to_string()).unwrap_or_default()
}

/// An array of strings, or a single string, as a list.
fn strings(value: &Value, key: &str) -> Vec<String> {
    match &value[key] {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => vec![],
    }
}

pub struct IntentRouter {
    client: CompletionClient,
    retriever: Arc<MemoryRetriever>,
    judge: FactJudge,
    drill_down_limit: usize,
}

impl IntentRouter {
    pub fn new(
        client: CompletionClient,
        retriever: Arc<MemoryRetriever>,
        judge: FactJudge,
        drill_down_limit: usize,
    ) -> Self {
        Self {
            client,
            retriever,
            judge,
            drill_down_limit,
        }
    }

    /// Classify `input` and run the matching sub-pipeline.
    pub async fn route(&self, input: &str, history: &ChatHistory) -> TurnReply {
        let plan = self.classify(input, history).await;
        info!(intent = ?plan.intent, positive = ?plan.positive, negative = ?plan.negative, "director intent");

        match plan.intent {
            Some(Intent::Store) => self.store(&plan).await,
            Some(Intent::Search) => self.search(input, &plan).await,
            Some(Intent::Chat) => self.chat(input, history, &plan).await,
            None => TurnReply::text(non_empty_or(&plan.response, "..."), Mood::Cryptic),
        }
    }

    async fn classify(&self, input: &str, history: &ChatHistory) -> DirectorPlan {
        let bridge = intent_bridge(input, history);
        if let Some(note) = &bridge {
            debug!(%note, "intent bridge");
        }
        let prompt = prompts::director_classifier(
            &history.transcript_tail(CLASSIFIER_HISTORY_CHARS),
            bridge.as_deref(),
            input,
        );
        let outcome = self
            .client
            .complete(
                vec![ChatMessage::system(prompt)],
                |v: &Value| has_text(v, "intent"),
                "director_classify",
            )
            .await;
        DirectorPlan::from_value(&outcome.into_value())
    }

    // ── STORE ──────────────────────────────────────────────────

    /// Facts are judged one at a time so later ones see earlier ones.
    async fn store(&self, plan: &DirectorPlan) -> TurnReply {
        let mut accepted: Vec<String> = Vec::new();
        let mut conflicts: Vec<String> = Vec::new();

        for fact in &plan.facts {
            let entity = if plan.entity_name.is_empty() {
                first_capitalized(fact).unwrap_or_default()
            } else {
                plan.entity_name.clone()
            };
            let keys = store_lookup_keys(&entity, fact);
            let existing = self.retriever.retrieve_director(&keys).await;
            let context = render_rows(&existing);

            let candidate = FactCandidate {
                fact,
                entities: &entity,
            };
            match self.judge.judge(candidate, &context, &accepted).await {
                FactVerdict::Duplicate | FactVerdict::Meta => {
                    debug!(%fact, "archive fact skipped");
                }
                FactVerdict::Contradiction(message) => {
                    warn!(%fact, %message, "archive fact conflicts with existing records");
                    conflicts.push(format!("Conflict: {message}"));
                }
                FactVerdict::New { fact: refined, .. } => {
                    let backend = self.retriever.backend();
                    match backend.store_director_fact(&refined, &entity, DIRECTOR_FACT_TAGS).await {
                        Ok(()) => info!(fact = %refined, %entity, "archive fact saved"),
                        Err(e) => warn!(error = %e, fact = %refined, "archive fact not saved"),
                    }
                    accepted.push(fact.clone());
                    if refined != *fact {
                        accepted.push(refined);
                    }
                }
            }
        }

        if conflicts.is_empty() {
            TurnReply::text(non_empty_or(&plan.response, "Database Updated."), Mood::Cryptic)
        } else {
            TurnReply::text(
                format!(
                    "Some facts conflicted with existing records.\n{}",
                    conflicts.join("\n")
                ),
                Mood::Cryptic,
            )
        }
    }

    // ── SEARCH ─────────────────────────────────────────────────

    async fn search(&self, input: &str, plan: &DirectorPlan) -> TurnReply {
        let mut targets = plan.positive.clone();
        let mut excludes = plan.negative.clone();

        if !targets.is_empty() {
            let rows = self.retriever.retrieve_director(&targets).await;
            if !rows.is_empty() {
                let database = render_rows(&rows).join("\n");
                let prompt = prompts::identity_resolver(input, &targets, &database);
                let outcome = self
                    .client
                    .complete(
                        vec![ChatMessage::system(prompt)],
                        |v: &Value| has_text(v, "status"),
                        "identity_resolver",
                    )
                    .await;
                if let Some(v) = outcome.parsed() {
                    if text(v, "status").eq_ignore_ascii_case("AMBIGUOUS") {
                        let question = non_empty_or(&text(v, "clarification_question"), "Which one do you mean?");
                        return TurnReply::text(question, Mood::Question);
                    }
                    let names = strings(v, "resolved_names");
                    if !names.is_empty() {
                        targets = names;
                    }
                    for extra in strings(v, "resolved_excludes") {
                        if !excludes.contains(&extra) {
                            excludes.push(extra);
                        }
                    }
                }
            }
        }

        let backend = self.retriever.backend();
        let mut result = match backend.director_search(input, &targets, &excludes).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "media search failed");
                MediaSearch::default()
            }
        };
        result.exclude(&excludes);

        if !result.found && targets.len() > 1 {
            info!(?targets, "joint search empty, offering individual footage");
            return TurnReply::text(cooperative_fallback(&targets), Mood::Question).with_decks(targets);
        }
        if result.found {
            TurnReply::text(non_empty_or(&plan.response, "Archive accessed."), Mood::Cryptic)
                .with_media(result.files)
        } else {
            TurnReply::text("No matching footage found.", Mood::Sad)
        }
    }

    // ── CHAT ───────────────────────────────────────────────────

    async fn chat(&self, input: &str, history: &ChatHistory, plan: &DirectorPlan) -> TurnReply {
        if plan.positive.is_empty() {
            let text = if plan.response.chars().count() > 2 {
                plan.response.clone()
            } else {
                "I need more specific names or traits to search the archive.".to_string()
            };
            return TurnReply::text(text, Mood::Cryptic).with_decks(deck_names(input));
        }

        let mut rows = self.retriever.retrieve_director(&plan.positive).await;
        if rows.is_empty() {
            return TurnReply::text(
                format!(
                    "I searched the archives for {} but found no records.",
                    plan.positive.join(", ")
                ),
                Mood::Sad,
            );
        }

        let targets = drill_down_targets(&rows, &plan.positive, self.drill_down_limit);
        if !targets.is_empty() {
            debug!(?targets, "drilling down");
            let more = self.retriever.retrieve_director(&targets).await;
            merge_rows(&mut rows, more);
        }
        let facts = render_rows(&rows).join("\n");

        let filter = self
            .client
            .complete(
                vec![ChatMessage::system(prompts::archive_filter(
                    &history.transcript_tail(FILTER_HISTORY_CHARS),
                    input,
                    &facts,
                ))],
                |v: &Value| has_array(v, "matches"),
                "archive_filter",
            )
            .await;
        let matches = filter.parsed().map(|v| strings(v, "matches")).unwrap_or_default();
        debug!(?matches, "archive filter");

        let answer = self
            .client
            .complete(
                vec![ChatMessage::system(prompts::archive_narrator(
                    &history.transcript_tail(NARRATOR_HISTORY_CHARS),
                    input,
                    &matches,
                    &facts,
                ))],
                |v: &Value| has_text(v, "response"),
                "archive_narrator",
            )
            .await
            .into_value();

        TurnReply::text(text(&answer, "response"), Mood::Cryptic).with_decks(matches)
    }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

/// "[Entity]: Fact" lines for prompts and judge context.
pub fn render_rows(rows: &[DirectorMemory]) -> Vec<String> {
    rows.iter()
        .map(|r| format!("[{}]: {}", r.entity, r.fact))
        .collect()
}

/// Append rows whose fact text is not already present.
fn merge_rows(rows: &mut Vec<DirectorMemory>, more: Vec<DirectorMemory>) {
    for row in more {
        if !rows.iter().any(|r| r.fact == row.fact) {
            rows.push(row);
        }
    }
}

/// Entities found in the first pass that were not asked for by name,
/// those whose first known fact mentions a requested trait ranked first.
pub fn drill_down_targets(rows: &[DirectorMemory], constraints: &[String], limit: usize) -> Vec<String> {
    let traits: Vec<String> = constraints.iter().map(|c| c.to_lowercase()).collect();
    let mut entities: Vec<(bool, String)> = Vec::new();
    for row in rows {
        let entity = row.entity.trim();
        if entity.is_empty()
            || constraints.iter().any(|c| c.eq_ignore_ascii_case(entity))
            || entities.iter().any(|(_, e)| e == entity)
        {
            continue;
        }
        let fact = row.fact.to_lowercase();
        let relevant = traits.iter().any(|t| fact.contains(t.as_str()));
        entities.push((relevant, entity.to_string()));
    }
    entities.sort_by_key(|(relevant, _)| !relevant);
    entities.into_iter().take(limit).map(|(_, e)| e).collect()
}

/// Names the user probably means when they write a pronoun or a terse
/// command, taken from the last assistant turn.
pub fn intent_bridge(input: &str, history: &ChatHistory) -> Option<String> {
    let short = input.split_whitespace().count() < BRIDGE_MAX_WORDS;
    let lower = input.to_lowercase();
    let has_pronoun = lower
        .split(|c: char| !c.is_alphabetic())
        .any(|w| BRIDGE_PRONOUNS.contains(&w));
    if !short && !has_pronoun {
        return None;
    }
    let last = history.last_by_role(Role::Assistant)?;
    let mut names: Vec<&str> = Vec::new();
    for m in CAPITALIZED.find_iter(&last.content) {
        let word = m.as_str();
        if !BRIDGE_EXCLUDED.contains(&word) && !names.contains(&word) {
            names.push(word);
        }
    }
    if names.is_empty() {
        return None;
    }
    Some(format!(
        "[SYSTEM NOTE: User pronoun/short command likely refers to these entities from previous turn: {}]",
        names.join(", ")
    ))
}

/// The entity plus every capitalised word of the fact.
pub fn store_lookup_keys(entity: &str, fact: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let words = CAPITALIZED.find_iter(fact).map(|m| m.as_str().to_string());
    for key in std::iter::once(entity.trim().to_string()).chain(words) {
        if key.chars().count() > 1 && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn first_capitalized(fact: &str) -> Option<String> {
    CAPITALIZED.find(fact).map(|m| m.as_str().to_string())
}

/// Title-case names in the input for a deck selector.
pub fn deck_names(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for m in FULL_NAME.find_iter(input) {
        let name = m
            .as_str()
            .split_whitespace()
            .filter(|w| !DECK_STOPWORDS.contains(w))
            .collect::<Vec<_>>()
            .join(" ");
        if name.chars().count() > 2 && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn cooperative_fallback(targets: &[String]) -> String {
    let subjects = match targets {
        [a, b] => format!("BOTH {a} and {b}"),
        [rest @ .., last] => format!("ALL of {} and {last}", rest.join(", ")),
        [] => String::new(),
    };
    format!(
        "I couldn't find a single scene with {subjects}. However, I can likely access their individual footage. Which one should I prioritize?"
    )
}

