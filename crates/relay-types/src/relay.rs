//! Types exchanged between the relay engine and its transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::MessageRole;

/// Wire shape of one streamed delta, as sent over SSE and WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEnvelope {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl DeltaEnvelope {
    /// Wrap an assistant text delta with a fresh id and timestamp.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content: content.into(),
            role: MessageRole::Assistant,
            created_at: Utc::now(),
        }
    }
}

/// Result of an explicit stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

/// How a relay cycle's upstream read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The provider signalled end of stream.
    Completed,
    /// Stopped explicitly, superseded by a newer request, or the subscriber went away.
    Cancelled,
    /// Network error or malformed chunk from the provider.
    UpstreamFailed,
    /// No delta arrived within the configured idle deadline.
    IdleTimeout,
}

impl EndReason {
    /// Whether the persisted reply is only a prefix of what the model would have produced.
    pub fn is_truncated(self) -> bool {
        !matches!(self, EndReason::Completed)
    }
}

/// Point-in-time copy of the relay counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatsSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_cancelled: u64,
    pub cycles_failed: u64,
    pub deltas_relayed: u64,
    pub deltas_dropped: u64,
    pub active_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_envelope_wire_shape() {
        let env = DeltaEnvelope::assistant("Hel");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["content"], "Hel");
        assert_eq!(json["role"], "assistant");
        assert!(json["createdAt"].is_string());
        assert!(json.get("created_at").is_none());
        assert!(!json["id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_delta_envelope_ids_are_unique() {
        let a = DeltaEnvelope::assistant("a");
        let b = DeltaEnvelope::assistant("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_end_reason_truncation() {
        assert!(!EndReason::Completed.is_truncated());
        assert!(EndReason::Cancelled.is_truncated());
        assert!(EndReason::UpstreamFailed.is_truncated());
        assert!(EndReason::IdleTimeout.is_truncated());
    }

    #[test]
    fn test_cancel_outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&CancelOutcome::NotFound).unwrap(),
            "\"not_found\""
        );
    }
}
