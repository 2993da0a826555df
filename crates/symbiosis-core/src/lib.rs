//! # symbiosis-core
//!
//! Core types for the Symbiosis conversational memory pipeline.
//! This crate defines the shared vocabulary used by every other crate in the workspace.

pub mod error;
pub mod graph;
pub mod message;
pub mod types;

pub use error::{Result, SymbiosisError};
pub use graph::{GraphBranch, GraphLeaf, GraphRoot, KnowledgeGraph};
pub use message::{ChatHistory, ChatMessage, Role};
pub use types::*;
