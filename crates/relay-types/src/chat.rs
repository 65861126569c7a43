//! Conversation thread and transcript message types.
//!
//! A thread is owned by exactly one user. Messages are immutable once
//! persisted; assistant messages are written once per relay cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Maximum number of characters kept from the first user message as a title.
pub const THREAD_TITLE_MAX_CHARS: usize = 60;

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted transcript message.
///
/// `model` is empty for user messages. `truncated` is only ever set on
/// assistant messages whose stream was cut short (cancelled, upstream
/// failure or idle timeout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub role: MessageRole,
    pub model: String,
    pub content: String,
    #[serde(default)]
    pub truncated: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a message to a thread.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub role: MessageRole,
    pub model: String,
    pub content: String,
    pub truncated: bool,
}

impl NewMessage {
    /// A user-authored message; carries no model identifier.
    pub fn user(thread_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            thread_id,
            user_id,
            role: MessageRole::User,
            model: String::new(),
            content: content.into(),
            truncated: false,
        }
    }

    /// The accumulated reply of one relay cycle.
    pub fn assistant(
        thread_id: Uuid,
        user_id: Uuid,
        model: impl Into<String>,
        content: impl Into<String>,
        truncated: bool,
    ) -> Self {
        Self {
            thread_id,
            user_id,
            role: MessageRole::Assistant,
            model: model.into(),
            content: content.into(),
            truncated,
        }
    }
}

/// Per-user message aggregates across every thread they own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub message_count: u64,
    /// Sum of content lengths in characters.
    pub total_length: u64,
}

/// Derive a thread title from the first user message.
pub fn thread_title(first_message: &str) -> String {
    first_message
        .trim()
        .chars()
        .take(THREAD_TITLE_MAX_CHARS)
        .collect()
}
