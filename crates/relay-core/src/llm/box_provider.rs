//! Type erasure for [`LlmProvider`].
//!
//! `LlmProvider::health_check` returns `impl Future`, so the trait cannot be
//! a trait object. [`ErasedProvider`] is the object-safe mirror with a boxed
//! future, implemented for every provider, and [`BoxLlmProvider`] owns one.

use std::future::Future;
use std::pin::Pin;

use relay_types::llm::{CompletionRequest, LlmError, ProviderKind};

use super::provider::{EventStream, LlmProvider};

type HealthFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LlmError>> + Send + 'a>>;

/// Object-safe view of an [`LlmProvider`].
pub trait ErasedProvider: Send + Sync {
    fn erased_name(&self) -> &str;
    fn erased_kind(&self) -> ProviderKind;
    fn erased_stream(&self, request: CompletionRequest) -> EventStream;
    fn erased_health_check(&self) -> HealthFuture<'_>;
}

impl<P: LlmProvider> ErasedProvider for P {
    fn erased_name(&self) -> &str {
        self.name()
    }

    fn erased_kind(&self) -> ProviderKind {
        self.kind()
    }

    fn erased_stream(&self, request: CompletionRequest) -> EventStream {
        self.stream(request)
    }

    fn erased_health_check(&self) -> HealthFuture<'_> {
        Box::pin(self.health_check())
    }
}

/// A provider chosen at runtime (cloud or local).
pub struct BoxLlmProvider(Box<dyn ErasedProvider>);

impl BoxLlmProvider {
    pub fn new<P: LlmProvider + 'static>(provider: P) -> Self {
        Self(Box::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.erased_name()
    }

    pub fn kind(&self) -> ProviderKind {
        self.0.erased_kind()
    }

    /// Lazy event stream; nothing is sent until it is polled.
    pub fn stream(&self, request: CompletionRequest) -> EventStream {
        self.0.erased_stream(request)
    }

    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.0.erased_health_check().await
    }
}
