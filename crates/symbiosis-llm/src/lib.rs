//! # symbiosis-llm
//!
//! Completion layer: a provider abstraction over OpenAI-compatible endpoints
//! and the [`CompletionClient`] that wraps every structured call in a hard
//! timeout, exponential backoff retry, and caller-supplied validation.

pub mod client;
pub mod mock;
pub mod openai;
pub mod provider;

pub use client::{AttemptOutcome, CompletionClient, RetryOutcome, RetryPolicy};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{CompletionProvider, CompletionRequest, CompletionResponse, Usage};
