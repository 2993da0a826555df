use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::graph::KnowledgeGraph;

/// Unique identifier for a session.
pub type SessionId = Uuid;

// ── Mood ───────────────────────────────────────────────────────

/// Closed set of moods understood by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Mood {
    #[default]
    Neutral,
    Affectionate,
    Cryptic,
    Dislike,
    Joyful,
    Curious,
    Sad,
    Glitch,
    Question,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Neutral,
        Mood::Affectionate,
        Mood::Cryptic,
        Mood::Dislike,
        Mood::Joyful,
        Mood::Curious,
        Mood::Sad,
        Mood::Glitch,
        Mood::Question,
    ];

    /// Map a mood label onto the closed set. Only the exact uppercase
    /// labels match; anything else collapses to `Neutral`.
    pub fn sanitize(raw: &str) -> Mood {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == raw)
            .unwrap_or_default()
    }

    /// Sanitize a model-produced value. Case and surrounding whitespace are
    /// folded first, so `" joyful "` reads as `Joyful`; missing or
    /// non-string values are `Neutral`.
    pub fn from_value(value: Option<&Value>) -> Mood {
        value
            .and_then(Value::as_str)
            .map(Mood::from_model)
            .unwrap_or_default()
    }

    fn from_model(raw: &str) -> Mood {
        Mood::sanitize(&raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Neutral => "NEUTRAL",
            Mood::Affectionate => "AFFECTIONATE",
            Mood::Cryptic => "CRYPTIC",
            Mood::Dislike => "DISLIKE",
            Mood::Joyful => "JOYFUL",
            Mood::Curious => "CURIOUS",
            Mood::Sad => "SAD",
            Mood::Glitch => "GLITCH",
            Mood::Question => "QUESTION",
        }
    }
}

impl From<String> for Mood {
    fn from(raw: String) -> Self {
        Mood::from_model(&raw)
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Intent ─────────────────────────────────────────────────────

/// Director-mode classification of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Store,
    Search,
    Chat,
}

impl Intent {
    pub fn parse(raw: &str) -> Option<Intent> {
        match raw.trim().to_uppercase().as_str() {
            "STORE" => Some(Intent::Store),
            "SEARCH" => Some(Intent::Search),
            "CHAT" => Some(Intent::Chat),
            _ => None,
        }
    }
}

// ── Session mode ───────────────────────────────────────────────

/// Which pipeline a turn runs through. Modes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Standard,
    Interrogation,
    Director,
}

// ── Memory entries ─────────────────────────────────────────────

/// A candidate fact extracted from a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub fact: String,
    /// Comma-joined entity tags.
    #[serde(default, deserialize_with = "de_tag_string")]
    pub entities: String,
    /// Comma-joined topic tags, including one energy tag.
    #[serde(default, deserialize_with = "de_tag_string")]
    pub topics: String,
    #[serde(default = "default_importance", deserialize_with = "de_importance")]
    pub importance: u8,
}

impl MemoryEntry {
    pub fn new(fact: impl Into<String>, entities: impl Into<String>, topics: impl Into<String>, importance: u8) -> Self {
        Self {
            fact: fact.into(),
            entities: entities.into(),
            topics: topics.into(),
            importance: importance.clamp(1, 10),
        }
    }

    /// Entity tags split and trimmed.
    pub fn entity_list(&self) -> Vec<String> {
        split_tags(&self.entities)
    }

    /// Empty or literal "null" facts are never persisted.
    pub fn is_blank(&self) -> bool {
        let f = self.fact.trim();
        f.is_empty() || f.eq_ignore_ascii_case("null")
    }
}

/// Day format used inside fact text and rendered memory rows ("Jan 29, 2025").
pub const FACT_DATE_FORMAT: &str = "%b %-d, %Y";

/// Render a date the way facts carry it.
pub fn format_fact_date(date: NaiveDate) -> String {
    date.format(FACT_DATE_FORMAT).to_string()
}

fn default_importance() -> u8 {
    5
}

/// Split a comma-joined tag string into trimmed, non-empty tags.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn de_tag_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    })
}

fn de_importance<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(5.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(5.0),
        _ => 5.0,
    };
    let n = if n.is_finite() { n } else { 5.0 };
    Ok(n.round().clamp(1.0, 10.0) as u8)
}

/// One row of the director archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorMemory {
    #[serde(rename = "Entity", alias = "entity", default)]
    pub entity: String,
    #[serde(rename = "Fact", alias = "fact", default)]
    pub fact: String,
}

// ── Media ──────────────────────────────────────────────────────

/// A media file returned by the archive search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MediaFile {
    /// Name and description, lowercased, for substring filtering.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.name, self.description.as_deref().unwrap_or("")).to_lowercase()
    }
}

/// An image used to render an entity deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualImage {
    pub url: String,
}

// ── Turn output ────────────────────────────────────────────────

/// Instruction for the presentation layer in director mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectorAction {
    ShowDecks,
    PlayMedia,
}

/// The single payload returned for every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub response_text: String,
    pub mood: Mood,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_action: Option<DirectorAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<MediaFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deck_keywords: Vec<String>,
}

impl TurnReply {
    pub fn text(response: impl Into<String>, mood: Mood) -> Self {
        Self {
            response_text: response.into(),
            mood,
            knowledge_graph: None,
            director_action: None,
            files: vec![],
            deck_keywords: vec![],
        }
    }

    pub fn with_graph(mut self, graph: KnowledgeGraph) -> Self {
        self.knowledge_graph = Some(graph);
        self
    }

    /// Ask the presentation layer to render entity decks.
    pub fn with_decks(mut self, keywords: Vec<String>) -> Self {
        if !keywords.is_empty() {
            self.director_action = Some(DirectorAction::ShowDecks);
            self.deck_keywords = keywords;
        }
        self
    }

    pub fn with_media(mut self, files: Vec<MediaFile>) -> Self {
        self.director_action = Some(DirectorAction::PlayMedia);
        self.files = files;
        self
    }
}
