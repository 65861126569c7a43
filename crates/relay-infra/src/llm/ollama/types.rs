//! Wire types for the local daemon's `/api/chat` endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Debug, Serialize)]
pub struct OllamaOptions {
    /// Upper bound on generated tokens.
    pub num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// One NDJSON line of a streamed reply.
#[derive(Debug, Deserialize)]
pub struct OllamaChatChunk {
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Present instead of `message` when the daemon fails mid-stream.
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_with_message() {
        let chunk: OllamaChatChunk = serde_json::from_str(
            r#"{"model":"llama3","created_at":"2026-01-01T00:00:00Z","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hel");
        assert!(!chunk.done);
    }

    #[test]
    fn test_final_chunk() {
        let chunk: OllamaChatChunk = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":""},"done":true,"done_reason":"length","total_duration":123}"#,
        )
        .unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.done_reason.as_deref(), Some("length"));
    }

    #[test]
    fn test_error_chunk() {
        let chunk: OllamaChatChunk =
            serde_json::from_str(r#"{"error":"model 'nope' not found"}"#).unwrap();
        assert!(chunk.message.is_none());
        assert_eq!(chunk.error.as_deref(), Some("model 'nope' not found"));
    }

    #[test]
    fn test_request_serialization() {
        let req = OllamaChatRequest {
            model: "llama3".into(),
            messages: vec![OllamaMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            stream: true,
            options: OllamaOptions { num_predict: 1000 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["options"]["num_predict"], 1000);
    }
}
