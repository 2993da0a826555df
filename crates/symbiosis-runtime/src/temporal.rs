//! Date validation for high-importance facts.
//!
//! ```text
//!   UNVALIDATED ──relative date──▶ VALID (rewritten locally)
//!        │
//!        ├──timekeeper: ok────────▶ VALID (possibly rewritten)
//!        │
//!        └──timekeeper: no date──▶ DEFERRED ──same-day memory──▶ VALID (detail appended)
//!                                      │
//!                                      └──▶ pending fact + clarifying question
//! ```

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::prompts;
use symbiosis_core::{ChatMessage, MemoryEntry, format_fact_date};
use symbiosis_llm::CompletionClient;
use symbiosis_llm::client::{has_bool, has_text};
use symbiosis_memory::MemoryRetriever;

/// Entries below this importance skip date validation.
pub const DEFAULT_IMPORTANCE_THRESHOLD: u8 = 4;

const FALLBACK_QUESTION: &str = "When did this happen?";

static RELATIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(last night|this morning|this afternoon|this evening|last week|last month|last (?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)|yesterday|today|tonight)\b",
    )
    .expect("valid relative-date regex")
});

/// Outcome of validating one turn's entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every entry may proceed to the writer.
    Ready(Vec<MemoryEntry>),
    /// A fact needs a date. The turn ends with `question`.
    Intercept { pending_fact: String, question: String },
}

enum Check {
    Valid(String),
    Deferred,
}

pub struct TemporalResolver {
    client: CompletionClient,
    retriever: Arc<MemoryRetriever>,
    threshold: u8,
}

impl TemporalResolver {
    pub fn new(client: CompletionClient, retriever: Arc<MemoryRetriever>, threshold: u8) -> Self {
        Self {
            client,
            retriever,
            threshold,
        }
    }

    /// Validate entries in order. The first fact that cannot be dated ends
    /// the pass; entries after it are dropped with the turn.
    pub async fn resolve(
        &self,
        entries: Vec<MemoryEntry>,
        keywords: &[String],
        input: &str,
        today: NaiveDate,
    ) -> Resolution {
        let mut ready = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.importance < self.threshold {
                ready.push(entry);
                continue;
            }
            match self.check(&entry, input, today).await {
                Check::Valid(fact) => {
                    entry.fact = fact;
                    ready.push(entry);
                }
                Check::Deferred => {
                    let related = self.retriever.retrieve(keywords).await;
                    if let Some(fact) = silent_latch(&entry.fact, &related.relevant_memories, today) {
                        info!(%fact, "same-day memory found, attaching detail");
                        entry.fact = fact;
                        ready.push(entry);
                        continue;
                    }
                    let question = self
                        .intercept(input, &entry.fact, &related.relevant_memories)
                        .await;
                    info!(fact = %entry.fact, "fact deferred until a date is given");
                    return Resolution::Intercept {
                        pending_fact: entry.fact,
                        question,
                    };
                }
            }
        }
        Resolution::Ready(ready)
    }

    async fn check(&self, entry: &MemoryEntry, input: &str, today: NaiveDate) -> Check {
        if let Some(rewritten) = rewrite_relative_dates(&entry.fact, today) {
            debug!(%rewritten, "relative date resolved locally");
            return Check::Valid(rewritten);
        }

        let prompt = prompts::timekeeper(input, &entry.fact, today);
        let outcome = self
            .client
            .complete(vec![ChatMessage::system(prompt)], timekeeper_valid, "timekeeper")
            .await;

        match outcome.parsed() {
            None => {
                warn!("timekeeper unavailable, keeping fact as stated");
                Check::Valid(entry.fact.clone())
            }
            Some(v) if v["valid"].as_bool() == Some(true) => Check::Valid(
                v["rewritten_fact"]
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| entry.fact.clone()),
            ),
            Some(_) => Check::Deferred,
        }
    }

    async fn intercept(&self, input: &str, fact: &str, candidates: &[String]) -> String {
        let prompt = prompts::interceptor(input, fact, candidates);
        let outcome = self
            .client
            .complete(
                vec![ChatMessage::system(prompt)],
                |v: &Value| has_text(v, "response"),
                "interceptor",
            )
            .await;
        outcome
            .parsed()
            .and_then(|v| v["response"].as_str())
            .map(String::from)
            .unwrap_or_else(|| FALLBACK_QUESTION.to_string())
    }
}

/// A valid verdict must carry a usable rewrite.
fn timekeeper_valid(value: &Value) -> bool {
    if !has_bool(value, "valid") {
        return false;
    }
    if value["valid"].as_bool() == Some(true) {
        return value["rewritten_fact"]
            .as_str()
            .is_some_and(|s| s.trim().chars().count() >= 5);
    }
    true
}

/// When any related memory already carries today's date, the deferred fact
/// is treated as a detail of that same-day event.
pub fn silent_latch(fact: &str, related: &[String], today: NaiveDate) -> Option<String> {
    let stamp = format_fact_date(today);
    related
        .iter()
        .any(|row| row.contains(&stamp))
        .then(|| format!("{fact} (Detail added on {stamp})"))
}

/// Rewrite relative day expressions to absolute dates. `None` when the fact
/// has none.
pub fn rewrite_relative_dates(fact: &str, today: NaiveDate) -> Option<String> {
    let re = &*RELATIVE_DATE;
    if !re.is_match(fact) {
        return None;
    }
    let rewritten = re.replace_all(fact, |caps: &Captures<'_>| {
        let phrase = caps[1].to_lowercase();
        let at_start = caps.get(1).is_some_and(|m| m.start() == 0);
        let text = absolute_phrase(&phrase, today);
        if at_start { capitalize(&text) } else { text }
    });
    Some(rewritten.into_owned())
}

fn absolute_phrase(phrase: &str, today: NaiveDate) -> String {
    let yesterday = days_before(today, 1);
    match phrase {
        "yesterday" => format!("on {}", format_fact_date(yesterday)),
        "last night" => format!("on the night of {}", format_fact_date(yesterday)),
        "last week" => format!("in the week of {}", format_fact_date(days_before(today, 7))),
        "last month" => {
            let prev = today
                .with_day(1)
                .and_then(|first| first.pred_opt())
                .unwrap_or(today);
            format!("in {}", prev.format("%B %Y"))
        }
        other => match other.strip_prefix("last ").and_then(|d| d.parse::<Weekday>().ok()) {
            Some(weekday) => format!("on {}", format_fact_date(previous_weekday(today, weekday))),
            None => format!("on {}", format_fact_date(today)),
        },
    }
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

/// The most recent `weekday` strictly before `today`.
fn previous_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let back = match (current + 7 - target) % 7 {
        0 => 7,
        n => n,
    };
    days_before(today, u64::from(back))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
