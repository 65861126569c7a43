//! LLM provider abstractions.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ModelGateway`: routes a model identifier to the cloud or local provider

pub mod box_provider;
pub mod gateway;
pub mod provider;
