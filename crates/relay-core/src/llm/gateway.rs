//! Model gateway: one entry point over the cloud and local providers.
//!
//! A model whose name starts with one of the configured cloud prefixes is
//! sent to the cloud provider; everything else goes to the local daemon.
//! The gateway flattens provider events into a plain sequence of text
//! deltas so the relay pump never sees backend-specific shapes.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use relay_types::llm::{CompletionRequest, LlmError, ProviderKind, StreamEvent};

use super::box_provider::BoxLlmProvider;

/// Lazy, finite sequence of reply text fragments.
///
/// `None` is a normal end of stream; an `Err` item ends the sequence early.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

/// Routes model identifiers to a provider and adapts its event stream.
pub struct ModelGateway {
    local: BoxLlmProvider,
    cloud: Option<BoxLlmProvider>,
    cloud_prefixes: Vec<String>,
}

/// Result of probing one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub kind: ProviderKind,
    pub name: String,
    pub configured: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelGateway {
    /// `cloud` is `None` when no cloud API key is configured; cloud models
    /// are then rejected by [`resolve`](Self::resolve).
    pub fn new(
        local: BoxLlmProvider,
        cloud: Option<BoxLlmProvider>,
        cloud_prefixes: Vec<String>,
    ) -> Self {
        Self {
            local,
            cloud,
            cloud_prefixes,
        }
    }

    /// Routing class for a model identifier.
    pub fn route(&self, model: &str) -> ProviderKind {
        let is_cloud = self
            .cloud_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && model.starts_with(prefix.as_str()));
        if is_cloud {
            ProviderKind::Cloud
        } else {
            ProviderKind::Local
        }
    }

    /// Provider that will serve `model`.
    pub fn resolve(&self, model: &str) -> Result<&BoxLlmProvider, LlmError> {
        match self.route(model) {
            ProviderKind::Cloud => self.cloud.as_ref().ok_or_else(|| {
                LlmError::Unavailable(format!(
                    "model '{model}' routes to the cloud provider, which has no API key configured"
                ))
            }),
            ProviderKind::Local => Ok(&self.local),
        }
    }

    /// Open a delta stream for the request.
    ///
    /// Routing errors surface here; everything else arrives through the
    /// stream once it is polled.
    pub fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, LlmError> {
        let provider = self.resolve(&request.model)?;
        let provider_name = provider.name().to_string();
        let mut events = provider.stream(request);

        Ok(Box::pin(async_stream::try_stream! {
            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::TextDelta { text } => {
                        if !text.is_empty() {
                            yield text;
                        }
                    }
                    StreamEvent::MessageDelta { stop_reason } => {
                        debug!(provider = %provider_name, %stop_reason, "upstream reply finished");
                    }
                    StreamEvent::Done => break,
                    StreamEvent::Connected => {}
                }
            }
        }))
    }

    /// Probe every provider. An unconfigured cloud provider is reported, not probed.
    pub async fn health(&self) -> Vec<ProviderHealth> {
        let mut report = Vec::with_capacity(2);

        let local = self.local.health_check().await;
        report.push(ProviderHealth {
            kind: ProviderKind::Local,
            name: self.local.name().to_string(),
            configured: true,
            healthy: local.is_ok(),
            error: local.err().map(|e| e.to_string()),
        });

        match &self.cloud {
            Some(cloud) => {
                let result = cloud.health_check().await;
                report.push(ProviderHealth {
                    kind: ProviderKind::Cloud,
                    name: cloud.name().to_string(),
                    configured: true,
                    healthy: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                });
            }
            None => report.push(ProviderHealth {
                kind: ProviderKind::Cloud,
                name: "cloud".to_string(),
                configured: false,
                healthy: false,
                error: None,
            }),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptStep, ScriptedProvider};
    use relay_types::llm::Message;

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user("hi")],
            max_tokens: 1000,
        }
    }

    fn gateway(with_cloud: bool) -> ModelGateway {
        let local = ScriptedProvider::local(vec![
            ScriptStep::Text("lo".into()),
            ScriptStep::Text("cal".into()),
        ]);
        let cloud = with_cloud.then(|| {
            BoxLlmProvider::new(ScriptedProvider::cloud(vec![ScriptStep::Text(
                "cloud".into(),
            )]))
        });
        ModelGateway::new(BoxLlmProvider::new(local), cloud, vec!["gpt".to_string()])
    }

    async fn collect(stream: DeltaStream) -> (Vec<String>, Option<LlmError>) {
        let mut stream = stream;
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => out.push(text),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[test]
    fn test_route_by_prefix() {
        let gw = gateway(true);
        assert_eq!(gw.route("gpt-4o"), ProviderKind::Cloud);
        assert_eq!(gw.route("gpt-3.5-turbo"), ProviderKind::Cloud);
        assert_eq!(gw.route("llama3"), ProviderKind::Local);
        assert_eq!(gw.route("my-gpt"), ProviderKind::Local);
    }

    #[test]
    fn test_empty_prefix_never_matches() {
        let gw = ModelGateway::new(
            BoxLlmProvider::new(ScriptedProvider::local(vec![])),
            None,
            vec![String::new()],
        );
        assert_eq!(gw.route("anything"), ProviderKind::Local);
    }

    #[test]
    fn test_cloud_model_without_key_is_rejected() {
        let gw = gateway(false);
        let err = gw.stream(request("gpt-4o")).err().unwrap();
        assert!(matches!(err, LlmError::Unavailable(_)));
        assert!(gw.resolve("llama3").is_ok());
    }

    #[tokio::test]
    async fn test_stream_routes_and_flattens_events() {
        let gw = gateway(true);

        let (local, err) = collect(gw.stream(request("llama3")).unwrap()).await;
        assert_eq!(local, vec!["lo", "cal"]);
        assert!(err.is_none());

        let (cloud, err) = collect(gw.stream(request("gpt-4o")).unwrap()).await;
        assert_eq!(cloud, vec!["cloud"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_stream_skips_empty_deltas_and_stops_at_done() {
        let provider = ScriptedProvider::local(vec![
            ScriptStep::Text(String::new()),
            ScriptStep::Text("a".into()),
            ScriptStep::Done,
            ScriptStep::Text("after-done".into()),
        ]);
        let gw = ModelGateway::new(BoxLlmProvider::new(provider), None, vec![]);
        let (out, err) = collect(gw.stream(request("llama3")).unwrap()).await;
        assert_eq!(out, vec!["a"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_stream_error_ends_sequence() {
        let provider = ScriptedProvider::local(vec![
            ScriptStep::Text("par".into()),
            ScriptStep::Fail("connection reset".into()),
            ScriptStep::Text("never".into()),
        ]);
        let gw = ModelGateway::new(BoxLlmProvider::new(provider), None, vec![]);
        let (out, err) = collect(gw.stream(request("llama3")).unwrap()).await;
        assert_eq!(out, vec!["par"]);
        assert!(matches!(err, Some(LlmError::Stream(_))));
    }

    #[tokio::test]
    async fn test_health_reports_unconfigured_cloud() {
        let gw = gateway(false);
        let report = gw.health().await;
        assert_eq!(report.len(), 2);
        assert!(report[0].healthy);
        assert_eq!(report[1].kind, ProviderKind::Cloud);
        assert!(!report[1].configured);
    }
}
