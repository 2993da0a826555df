//! # symbiosis-cli
//!
//! Command-line interface for the Symbiosis companion.
//!
//! ## Commands
//!
//! - `symbiosis chat`: Interactive chat in the terminal
//! - `symbiosis ask`: One turn, reply printed as JSON
//! - `symbiosis visuals`: Images linked to an entity deck
//! - `symbiosis config`: Show configuration
//! - `symbiosis doctor`: Audit configuration
//! - `symbiosis init`: Write a starter `symbiosis.toml`

pub mod commands;

pub use commands::Cli;
