//! Shared domain types for the chat relay.
//!
//! Threads, messages, LLM request/stream shapes, the delta envelope sent to
//! clients, runtime configuration and the error enums every layer shares.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod relay;
