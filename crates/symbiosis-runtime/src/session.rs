use chrono::{DateTime, Utc};
use uuid::Uuid;

use symbiosis_core::{ChatHistory, ChatMessage, Mood, SessionMode, TurnReply};
use symbiosis_memory::ChatRow;

pub const DIRECTOR_COMMAND: &str = "director mode";
pub const INTERROGATION_COMMAND: &str = "question time";
pub const EXIT_COMMAND: &str = "done";

/// A conversation session.
///
/// Carries everything a turn reads or mutates besides the memory backend:
/// the bounded history, the active mode, the pending fact latch, and the
/// last reply mood.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub history: ChatHistory,
    pub mode: SessionMode,
    /// At most one fact waiting for a date.
    pub pending_fact: Option<String>,
    /// Mood of the last reply.
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: ChatHistory::default(),
            mode: SessionMode::Standard,
            pending_fact: None,
            mood: Mood::Neutral,
            created_at: Utc::now(),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history = ChatHistory::new(limit);
        self
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_director(&self) -> bool {
        self.mode == SessionMode::Director
    }

    pub fn is_interrogation(&self) -> bool {
        self.mode == SessionMode::Interrogation
    }

    /// Handle a mode command. Returns the reply when `input` was one.
    ///
    /// `done` only counts as a command while a non-standard mode is active;
    /// in standard mode it is ordinary input.
    pub fn command(&mut self, input: &str) -> Option<TurnReply> {
        let cmd = input.trim().to_lowercase();
        let (mode, text, mood) = match (cmd.as_str(), self.mode) {
            (DIRECTOR_COMMAND, _) => (
                SessionMode::Director,
                "DIRECTOR MODE ENGAGED. ACCESSING ARCHIVES.",
                Mood::Cryptic,
            ),
            (INTERROGATION_COMMAND, _) => (
                SessionMode::Interrogation,
                "MODE: INTERROGATION. WHAT SHALL WE DISCUSS?",
                Mood::Question,
            ),
            (EXIT_COMMAND, SessionMode::Director) => (
                SessionMode::Standard,
                "RETURNING TO STANDARD MEMORY.",
                Mood::Neutral,
            ),
            (EXIT_COMMAND, SessionMode::Interrogation) => (
                SessionMode::Standard,
                "RETURNING TO HOMEOSTASIS.",
                Mood::Neutral,
            ),
            _ => return None,
        };
        self.mode = mode;
        self.mood = mood;
        Some(TurnReply::text(text, mood))
    }

    /// Append the finished exchange to history.
    pub fn record_exchange(&mut self, input: &str, reply: &TurnReply) {
        self.history.push(ChatMessage::user(input));
        self.history.push(ChatMessage::assistant(reply.response_text.clone()));
        self.mood = reply.mood;
    }

    /// Seed history from persisted chat rows. When the newest row is more
    /// than `gap_hours` old, a system note announces the gap.
    pub fn restore(&mut self, rows: Vec<ChatRow>, now: DateTime<Utc>, gap_hours: i64) {
        let last_seen = rows.last().map(|r| r.timestamp);
        for row in rows {
            self.history.push(ChatMessage {
                role: row.role,
                content: row.content,
                timestamp: Some(row.timestamp),
            });
        }
        if let Some(last) = last_seen {
            let hours = (now - last).num_hours();
            if hours > gap_hours {
                self.history.push(ChatMessage::system(format!(
                    "[SYSTEM_NOTE: The user has returned after {hours} hours. Treat this as a new session context, but retain previous memories.]"
                )));
            }
        }
    }
}
