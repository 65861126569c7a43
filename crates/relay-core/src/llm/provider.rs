//! LlmProvider trait definition.
//!
//! This is the core abstraction that both upstream backends implement.
//! Uses RPITIT for `health_check` and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use relay_types::llm::{CompletionRequest, LlmError, ProviderKind, StreamEvent};

/// Boxed event stream returned by [`LlmProvider::stream`].
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for LLM provider backends.
///
/// Implementations live in relay-infra (`OpenAiCompatibleProvider`, `OllamaProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Which routing class this provider serves.
    fn kind(&self) -> ProviderKind;

    /// Send a streaming completion request. Returns a lazy stream of events.
    ///
    /// Nothing is sent upstream until the stream is first polled.
    fn stream(&self, request: CompletionRequest) -> EventStream;

    /// Cheap reachability probe used by `relayd check` and deep health checks.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), LlmError>> + Send;
}
