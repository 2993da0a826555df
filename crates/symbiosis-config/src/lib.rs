//! # symbiosis-config
//!
//! Configuration for the Symbiosis companion. Reads from `symbiosis.toml`, then
//! applies environment variable overrides, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::SymbiosisConfig;
pub use schema::{
    AgentConfig, CompletionConfig, ConfigWarning, LoggingConfig, MemoryConfig, PipelineConfig,
    ServicesConfig, WarningSeverity,
};
