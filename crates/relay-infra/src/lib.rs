//! Infrastructure layer for the chat relay.
//!
//! Implementations of the ports defined in `relay-core`: the SQLite
//! transcript store, the cloud and local LLM providers, and the
//! configuration loader.

pub mod config;
pub mod llm;
pub mod sqlite;
