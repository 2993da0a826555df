use thiserror::Error;

/// Unified error type for the Symbiosis pipeline.
#[derive(Error, Debug)]
pub enum SymbiosisError {
    // ── Completion errors ──────────────────────────────────────
    #[error("completion transport error: {0}")]
    Completion(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("credentials rejected (HTTP {status})")]
    Credentials { status: u16 },

    #[error("completion timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("invalid structured response: {0}")]
    InvalidResponse(String),

    #[error("response failed validation: {label}")]
    Validation { label: String },

    // ── Memory backend errors ──────────────────────────────────
    #[error("memory backend error: {0}")]
    Memory(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SymbiosisError {
    /// Credential failures never heal on retry.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, SymbiosisError::Credentials { .. })
    }
}

pub type Result<T> = std::result::Result<T, SymbiosisError>;
