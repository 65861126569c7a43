//! LLM request and streaming types.
//!
//! These model what the relay sends to a provider and what comes back
//! while a reply is being generated, independent of the wire format of any
//! particular backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub const ALL: [MessageRole; 3] = [Self::System, Self::User, Self::Assistant];

    /// Lowercase form used on the wire and in the `role` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown message role {s:?}"))
    }
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request to an LLM provider for a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

/// Which backend a model identifier is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted OpenAI-compatible completion API.
    Cloud,
    /// Locally running inference daemon.
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        })
    }
}

/// Why the upstream model ended its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ContentFilter,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::ContentFilter => "content_filter",
        })
    }
}

/// Provider-neutral streaming events, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Upstream accepted the request.
    Connected,

    /// An incremental piece of reply text.
    TextDelta { text: String },

    /// The reply is finishing with a stop reason.
    MessageDelta { stop_reason: StopReason },

    /// The provider signalled the normal end of the stream.
    Done,
}

/// Failures while routing to or streaming from a provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("upstream provider failed: {message}")]
    Provider { message: String },

    #[error("could not decode upstream payload: {0}")]
    Deserialization(String),

    #[error("upstream stream broke: {0}")]
    Stream(String),

    #[error("upstream rate limit hit (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("upstream rejected the credentials")]
    AuthenticationFailed,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Caller error, not an upstream one.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
