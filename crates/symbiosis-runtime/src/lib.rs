//! # symbiosis-runtime
//!
//! The turn pipeline: turns one utterance into one mood-tagged reply by
//! orchestrating completion calls and memory backend actions.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │   Session    │  ← history, mode, pending fact
//!              └──────┬───────┘
//!                     │ utterance
//!                     ▼
//!              ┌──────────────┐
//!              │   Pipeline   │
//!              │              │
//!              │  0. Guards   │  ← mode commands, garbage, injection
//!              │  1. Synth    │  ← keywords + candidate facts
//!              │  2. Date     │  ← TemporalResolver (may intercept)
//!              │  3. Recall   │  ← MemoryRetriever
//!              │  4. Generate │  ← ResponseGenerator
//!              │  5. Audit    │  ← RedundancyGuard (interrogation)
//!              │  6. Remember │  ← MemoryWriter queue
//!              └──────────────┘
//!                     │ director mode
//!                     ▼
//!              ┌──────────────┐
//!              │ IntentRouter │  ← STORE / SEARCH / CHAT
//!              └──────────────┘
//! ```

pub mod dedup;
pub mod director;
pub mod generator;
pub mod guard;
pub mod pipeline;
pub mod prompts;
pub mod redundancy;
pub mod session;
pub mod synthesis;
pub mod temporal;
pub mod writer;

pub use dedup::{FactCandidate, FactJudge, FactVerdict};
pub use director::{DirectorPlan, IntentRouter};
pub use generator::{Generated, GenerationRequest, ResponseGenerator};
pub use pipeline::{Pipeline, PipelineSettings};
pub use prompts::Persona;
pub use redundancy::{RedundancyGuard, RedundancyReason};
pub use session::Session;
pub use synthesis::{Synthesis, Synthesizer};
pub use temporal::{Resolution, TemporalResolver};
pub use writer::{MemoryWriter, WriteJob};
