//! Cloud provider speaking the OpenAI chat completions protocol.
//!
//! Requests and the SSE stream go through [`async_openai`]. The health probe
//! lists `/models` with a plain reqwest client so it can use a short timeout.

pub mod streaming;

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use secrecy::{ExposeSecret, SecretString};

use relay_core::llm::provider::{EventStream, LlmProvider};
use relay_types::llm::{CompletionRequest, LlmError, Message, MessageRole, ProviderKind};

use self::streaming::map_openai_stream;

const PROVIDER_NAME: &str = "openai";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// No Debug: both clients hold the API key.
pub struct OpenAiCompatibleProvider {
    chat: Client<OpenAIConfig>,
    probe: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, LlmError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let chat = Client::with_config(
            OpenAIConfig::new()
                .with_api_base(&base_url)
                .with_api_key(api_key.expose_secret()),
        );
        let probe = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self {
            chat,
            probe,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn chat_request(request: &CompletionRequest) -> CreateChatCompletionRequest {
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(wire_message).collect(),
        max_completion_tokens: Some(request.max_tokens),
        stream: Some(true),
        ..Default::default()
    }
}

fn wire_message(message: &Message) -> ChatCompletionRequestMessage {
    let text = message.content.clone();
    match message.role {
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }),
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            })
        }
        // `function_call` is deprecated upstream but still a required field.
        #[allow(deprecated)]
        MessageRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
                name: None,
                refusal: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let body = chat_request(&request);
        let chat = self.chat.clone();

        Box::pin(async_stream::try_stream! {
            let chunks = chat.chat().create_stream(body).await.map_err(llm_error)?;
            for await event in map_openai_stream(chunks) {
                yield event?;
            }
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let url = format!("{}/models", self.base_url);
        let status = self
            .probe
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("{url}: {e}")))?
            .status();

        if status.is_success() {
            return Ok(());
        }
        Err(status_error(status.as_u16()).unwrap_or_else(|| LlmError::Provider {
            message: format!("GET {url} returned HTTP {status}"),
        }))
    }
}

/// Auth and rate-limit statuses get their own variants.
fn status_error(status: u16) -> Option<LlmError> {
    match status {
        401 | 403 => Some(LlmError::AuthenticationFailed),
        429 => Some(LlmError::RateLimited {
            retry_after_ms: None,
        }),
        _ => None,
    }
}

fn llm_error(err: OpenAIError) -> LlmError {
    let classified = match &err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            if code == "invalid_api_key" || kind == "authentication_error" {
                Some(LlmError::AuthenticationFailed)
            } else if code == "rate_limit_exceeded" || kind == "rate_limit_error" {
                status_error(429)
            } else {
                None
            }
        }
        OpenAIError::Reqwest(e) => e.status().and_then(|s| status_error(s.as_u16())),
        OpenAIError::JSONDeserialize(_, body) => Some(LlmError::Deserialization(format!(
            "unexpected response body: {body}"
        ))),
        OpenAIError::StreamError(e) => Some(LlmError::Stream(e.to_string())),
        OpenAIError::InvalidArgument(msg) => Some(LlmError::InvalidRequest(msg.clone())),
        _ => None,
    };
    classified.unwrap_or_else(|| LlmError::Provider {
        message: err.to_string(),
    })
}
