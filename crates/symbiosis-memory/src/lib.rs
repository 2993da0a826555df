//! # symbiosis-memory
//!
//! Access to the external key-fact store:
//!
//! - **Backend**: the action contract (`retrieve`, `store_atomic`, director
//!   archive, media search, chat log) as the [`MemoryBackend`] trait.
//! - **HTTP backend**: the remote store, one JSON POST per action.
//! - **SQLite backend**: a local store with the same contract.
//! - **Retriever**: per-turn search key construction over recent history.

pub mod backend;
pub mod http;
pub mod retriever;
pub mod store;

pub use backend::{ChatRow, MediaSearch, MemoryBackend, Retrieval};
pub use http::HttpMemoryBackend;
pub use retriever::{KeywordPlan, KeywordQuery, MemoryRetriever};
pub use store::SqliteMemoryBackend;
