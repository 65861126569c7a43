//! Local inference daemon provider (Ollama-style `/api/chat`).
//!
//! Streams replies as newline-delimited JSON over a plain HTTP response
//! body. Each line carries `message.content`; the last one has
//! `done: true`. A body that simply ends is treated as a normal end of
//! stream.

pub mod ndjson;
pub mod types;

use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use relay_core::llm::provider::{EventStream, LlmProvider};
use relay_types::llm::{CompletionRequest, LlmError, ProviderKind, StopReason, StreamEvent};

use self::ndjson::NdjsonDecoder;
use self::types::{OllamaChatChunk, OllamaChatRequest, OllamaMessage, OllamaOptions};

/// Default address of the local daemon.
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(request: &CompletionRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            options: OllamaOptions {
                num_predict: request.max_tokens,
            },
        }
    }
}

/// Decode one NDJSON line into the events it carries.
fn events_for_line(line: &[u8]) -> Result<(Vec<StreamEvent>, bool), LlmError> {
    let chunk: OllamaChatChunk = serde_json::from_slice(line)
        .map_err(|e| LlmError::Deserialization(format!("ndjson chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Provider { message: error });
    }

    let mut events = Vec::with_capacity(2);
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            events.push(StreamEvent::TextDelta {
                text: message.content,
            });
        }
    }
    if chunk.done {
        let stop_reason = match chunk.done_reason.as_deref() {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };
        events.push(StreamEvent::MessageDelta { stop_reason });
    }
    Ok((events, chunk.done))
}

/// Pass a 2xx response through; turn anything else into a provider error
/// carrying the status and the body the daemon sent.
async fn success_or_error(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Provider {
        message: format!("HTTP {status}: {body}"),
    })
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::build_request(&request);

        Box::pin(async_stream::try_stream! {
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Provider {
                    message: format!("HTTP request failed: {e}"),
                })?;

            let response = success_or_error(response).await?;
            yield StreamEvent::Connected;

            let mut byte_stream = response.bytes_stream();
            let mut decoder = NdjsonDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result
                    .map_err(|e| LlmError::Stream(format!("response body read: {e}")))?;
                decoder.push(&chunk);

                while let Some(line) = decoder.next_line() {
                    let (events, done) = events_for_line(&line)?;
                    for event in events {
                        yield event;
                    }
                    if done {
                        yield StreamEvent::Done;
                        return;
                    }
                }
            }

            if let Some(line) = decoder.finish() {
                let (events, _) = events_for_line(&line)?;
                for event in events {
                    yield event;
                }
            }
            debug!(url = %url, "local stream closed without done marker");
            yield StreamEvent::Done;
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("{}: {e}", self.base_url)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Provider {
                message: format!("tag listing returned HTTP {}", response.status()),
            })
        }
    }
}
