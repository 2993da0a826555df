use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration: maps to `symbiosis.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbiosisConfig {
    pub agent: AgentConfig,
    pub completion: CompletionConfig,
    pub memory: MemoryConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the completion endpoint, e.g. "x-ai/grok-4.1-fast".
    pub model: String,
    /// Name of the person the companion is talking to. Facts are written in
    /// the third person about this subject.
    pub subject_name: String,
    /// Pronouns used for the subject in extracted facts.
    pub subject_pronouns: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "x-ai/grok-4.1-fast".into(),
            subject_name: "User".into(),
            subject_pronouns: "they/them".into(),
        }
    }
}

// ── Completion ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// OpenAI-compatible base URL.
    pub base_url: String,
    /// Sent as the `X-Title` header.
    pub app_title: String,
    /// Hard timeout per attempt, in seconds.
    pub timeout_secs: u64,
    /// Total attempts per structured call, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles after each failed attempt.
    pub base_delay_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            app_title: "Symbiosis".into(),
            timeout_secs: 15,
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Remote fact store endpoint. When unset, the local SQLite store is used.
    pub backend_url: Option<String>,
    /// Path to the local SQLite fact store.
    pub db_path: PathBuf,
    /// Messages kept in the rolling chat history.
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            db_path: PathBuf::from("symbiosis.db"),
            history_limit: 10,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chance per standard-mode turn of injecting relationship keywords.
    pub ghost_audit_probability: f64,
    /// Maximum entities broadened in a director CHAT drill-down.
    pub drill_down_limit: usize,
    /// Hours of silence after which a restored session gets a gap note.
    pub time_gap_hours: i64,
    /// Pending background writes before new jobs wait for room.
    pub writer_queue_capacity: usize,
    /// Facts at or above this importance must carry a date.
    pub importance_threshold: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ghost_audit_probability: 0.05,
            drill_down_limit: 15,
            time_gap_hours: 6,
            writer_queue_capacity: 64,
            importance_threshold: 4,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// External service API keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// OpenRouter (or other OpenAI-compatible) API key.
    /// Can also be set via OPENROUTER_API_KEY environment variable.
    /// Config file takes priority over environment variable.
    pub openrouter_api_key: Option<String>,
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SymbiosisConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Model ───
        if self.agent.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'x-ai/grok-4.1-fast' or 'openai/gpt-4o-mini'".into()),
            });
        }

        if self.agent.subject_name.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.subject_name".into(),
                message: "subject name is empty: facts will be written without a subject".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to the name of the person using the companion".into()),
            });
        }

        // ── Completion ───
        if self.completion.max_attempts == 0 {
            warnings.push(ConfigWarning {
                field: "completion.max_attempts".into(),
                message: "max_attempts is 0: no completion would ever be sent".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to 3".into()),
            });
        }
        if self.completion.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "completion.timeout_secs".into(),
                message: "timeout is 0: every attempt would expire immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to 15".into()),
            });
        }

        // ── Memory ───
        if self.memory.history_limit == 0 {
            warnings.push(ConfigWarning {
                field: "memory.history_limit".into(),
                message: "history limit is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to 10".into()),
            });
        }
        if let Some(ref url) = self.memory.backend_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            warnings.push(ConfigWarning {
                field: "memory.backend_url".into(),
                message: format!("backend URL '{}' is not an http(s) URL", url),
                severity: WarningSeverity::Warning,
                hint: Some("Remove it to use the local SQLite store".into()),
            });
        }

        // ── Pipeline ───
        let p = self.pipeline.ghost_audit_probability;
        if !(0.0..=1.0).contains(&p) {
            warnings.push(ConfigWarning {
                field: "pipeline.ghost_audit_probability".into(),
                message: format!("probability {} is out of range", p),
                severity: WarningSeverity::Error,
                hint: Some("Must be between 0.0 and 1.0".into()),
            });
        }
        if self.pipeline.writer_queue_capacity == 0 {
            warnings.push(ConfigWarning {
                field: "pipeline.writer_queue_capacity".into(),
                message: "writer queue capacity is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 64".into()),
            });
        }

        // ── Credentials ───
        if self.services.openrouter_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.openrouter_api_key".into(),
                message: "no completion API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set OPENROUTER_API_KEY or services.openrouter_api_key".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
