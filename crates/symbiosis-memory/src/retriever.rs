//! Per-turn search key construction and degrading retrieval.
//!
//! Keywords are merged from several sources in a fixed order: model-extracted
//! keywords, title-cased words from short raw input, sticky words from the
//! last assistant turn, a deep anchor from recent user turns, and the
//! occasional ghost audit injection.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::backend::{MemoryBackend, Retrieval};
use symbiosis_core::{ChatHistory, DirectorMemory, Role};

/// Raw input shorter than this is mined for title-cased keywords.
pub const RAW_INJECTION_MAX_CHARS: usize = 50;
/// Input shorter than this triggers the deep anchor outside interrogation.
pub const DEEP_ANCHOR_MAX_CHARS: usize = 30;
/// How many recent user turns the deep anchor scans.
pub const DEEP_ANCHOR_DEPTH: usize = 5;
/// Sticky words taken from the last assistant turn.
pub const STICKY_WORDS: usize = 2;

/// Keywords forced into the query when the ghost audit fires.
pub const GHOST_AUDIT_KEYWORDS: [&str; 3] = ["Relationship", "BONDING", "SocialFitness"];

const RAW_STOPWORDS: &[&str] = &[
    "no", "yes", "nope", "yeah", "dont", "know", "what", "when", "where", "who", "why", "i",
    "lets", "talk", "about",
];

const ANCHOR_EXCLUDED: &[&str] = &[
    "Who", "What", "Where", "When", "Why", "How", "I", "No", "Yes", "I'm",
];

const FALLBACK_STOPWORDS: &[&str] = &["what", "when", "where", "dont", "know"];

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-zA-Z]+").expect("valid capitalized-word regex"));

/// Inputs to keyword construction for one turn.
#[derive(Debug, Clone, Copy)]
pub struct KeywordQuery<'a> {
    /// The user's utterance for this turn.
    pub input: &'a str,
    /// Keywords the synthesis step extracted.
    pub extracted: &'a [String],
    /// History before this turn.
    pub history: &'a ChatHistory,
    /// Interrogation mode suppresses the ghost audit and always deep-anchors.
    pub interrogation: bool,
}

/// The merged keyword set for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordPlan {
    pub keywords: Vec<String>,
    /// Whether the ghost audit fired this turn.
    pub ghost_audit: bool,
}

/// Builds search keys and queries the backend, degrading to no context on error.
pub struct MemoryRetriever {
    backend: Arc<dyn MemoryBackend>,
    ghost_probability: f64,
    rng: Mutex<StdRng>,
}

impl MemoryRetriever {
    pub fn new(backend: Arc<dyn MemoryBackend>, ghost_probability: f64) -> Self {
        Self {
            backend,
            ghost_probability: ghost_probability.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic ghost audit rolls.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn backend(&self) -> &Arc<dyn MemoryBackend> {
        &self.backend
    }

    /// Roll the ghost audit for this turn.
    fn ghost_audit_fires(&self) -> bool {
        self.rng.lock().gen_bool(self.ghost_probability)
    }

    /// Merge every keyword source for this turn into one deduplicated list.
    pub fn build_keywords(&self, query: &KeywordQuery<'_>) -> KeywordPlan {
        let mut keys: Vec<String> = query.extracted.to_vec();

        if query.input.chars().count() < RAW_INJECTION_MAX_CHARS {
            keys.extend(title_case_words(query.input));
        }

        if !query.history.is_empty() {
            if let Some(last_ai) = query.history.last_by_role(Role::Assistant) {
                keys.extend(sticky_words(&last_ai.content));
            }

            if query.interrogation || query.input.chars().count() < DEEP_ANCHOR_MAX_CHARS {
                let anchor = deep_anchor(query.history);
                if !anchor.is_empty() {
                    debug!(?anchor, "deep anchor found");
                    keys.extend(anchor);
                }
            }
        }

        let ghost_audit = !query.interrogation && self.ghost_audit_fires();
        if ghost_audit {
            info!("attention audit triggered, injecting relationship keys");
            keys.extend(GHOST_AUDIT_KEYWORDS.iter().map(|s| s.to_string()));
        }

        let mut keywords = dedup_keywords(keys);
        if keywords.is_empty() {
            keywords = fallback_keywords(query.input);
        }
        KeywordPlan {
            keywords,
            ghost_audit,
        }
    }

    /// `retrieve` with backend errors logged and turned into an empty result.
    pub async fn retrieve(&self, keywords: &[String]) -> Retrieval {
        if keywords.is_empty() {
            return Retrieval::empty();
        }
        debug!(?keywords, backend = self.backend.name(), "retrieving memories");
        match self.backend.retrieve(keywords).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without context");
                Retrieval::empty()
            }
        }
    }

    /// `retrieve_director_memory` with the same degrading policy.
    pub async fn retrieve_director(&self, keywords: &[String]) -> Vec<DirectorMemory> {
        if keywords.is_empty() {
            return vec![];
        }
        match self.backend.retrieve_director_memory(keywords).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "director retrieval failed, continuing without context");
                vec![]
            }
        }
    }
}

/// Lowercase letters-only words from the raw input, stopwords removed,
/// first letter uppercased ("lets talk about ruben" → ["Ruben"]).
pub fn title_case_words(input: &str) -> Vec<String> {
    let clean: String = input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || *c == ' ')
        .collect();
    clean
        .split(' ')
        .filter(|w| w.len() > 2 && !RAW_STOPWORDS.contains(w))
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Up to two purely alphabetic words longer than five letters.
pub fn sticky_words(text: &str) -> Vec<String> {
    text.split(' ')
        .filter(|w| w.len() > 5 && w.chars().all(|c| c.is_ascii_alphabetic()))
        .take(STICKY_WORDS)
        .map(String::from)
        .collect()
}

/// Capitalized tokens from the most recent of the last five user turns that
/// has any, ignoring interrogatives and pronouns.
pub fn deep_anchor(history: &ChatHistory) -> Vec<String> {
    let re = &*CAPITALIZED;
    history
        .by_role(Role::User)
        .into_iter()
        .rev()
        .take(DEEP_ANCHOR_DEPTH)
        .map(|msg| {
            re.find_iter(&msg.content)
                .map(|m| m.as_str())
                .filter(|w| !ANCHOR_EXCLUDED.contains(w))
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .find(|caps| !caps.is_empty())
        .unwrap_or_default()
}

/// First occurrence wins; keywords of two characters or fewer are dropped.
pub fn dedup_keywords(keys: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for k in keys {
        let k = k.trim().to_string();
        if k.chars().count() > 2 && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

/// Raw input words longer than three characters.
pub fn fallback_keywords(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .filter(|w| w.len() > 3 && !FALLBACK_STOPWORDS.contains(&w.to_lowercase().as_str()))
        .map(String::from)
        .collect()
}
