//! Transcript read and delete endpoints.
//!
//! Endpoints:
//! - GET    /api/v1/threads                - Threads of the caller
//! - GET    /api/v1/threads/{id}           - One thread and its relay state
//! - GET    /api/v1/threads/{id}/messages  - Messages of a thread
//! - DELETE /api/v1/threads/{id}           - Delete a thread (stops its relay)
//! - GET    /api/v1/messages/{id}          - A single message
//! - GET    /api/v1/usage                  - Message count and total length

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relay_core::chat::repository::TranscriptStore;
use relay_types::chat::{ChatMessage, ChatThread, UsageSummary};
use relay_types::relay::CancelOutcome;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::handlers::parse_uuid;
use crate::http::response::Envelope;
use crate::state::AppState;

/// Query parameters for message listing.
#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    #[serde(default = "default_message_limit")]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

fn default_message_limit() -> Option<i64> {
    Some(100)
}

/// A thread plus the state of its relay session.
#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: ChatThread,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DeleteThreadResponse {
    pub thread_id: Uuid,
    pub deleted: bool,
    pub stopped: bool,
}

impl ThreadSummary {
    fn new(thread: ChatThread, state: &AppState) -> Self {
        let registry = state.pump.registry();
        let streaming = registry.has_session(&thread.id);
        Self {
            session_started_at: streaming
                .then(|| registry.session_started_at(&thread.id))
                .flatten(),
            streaming,
            thread,
        }
    }
}

/// GET /api/v1/threads - List the caller's threads, most recent first.
pub async fn list_threads(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<Vec<ThreadSummary>>>, AppError> {
    let start = Instant::now();
    let threads = state.store().list_threads(&user_id).await?;
    let summaries = threads
        .into_iter()
        .map(|thread| ThreadSummary::new(thread, &state))
        .collect();

    Ok(Json(Envelope::ok(summaries, start)))
}

/// GET /api/v1/threads/{id} - Thread metadata for its owner.
pub async fn get_thread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
) -> Result<Json<Envelope<ThreadSummary>>, AppError> {
    let start = Instant::now();
    let thread_id = parse_uuid(&thread_id)?;

    let thread = state.store().authorize_thread(&thread_id, &user_id).await?;
    let resp = Envelope::ok(ThreadSummary::new(thread, &state), start)
        .link("messages", format!("/api/v1/threads/{thread_id}/messages"))
        .link("stream", format!("/api/v1/threads/{thread_id}/stream"));
    Ok(Json(resp))
}

/// GET /api/v1/threads/{id}/messages - Transcript of a thread, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Envelope<Vec<ChatMessage>>>, AppError> {
    let start = Instant::now();
    let thread_id = parse_uuid(&thread_id)?;

    state.store().authorize_thread(&thread_id, &user_id).await?;
    let messages = state
        .store()
        .list_messages(&thread_id, query.limit, query.offset)
        .await?;

    let resp = Envelope::ok(messages, start)
        .link("stream", format!("/api/v1/threads/{thread_id}/stream"));
    Ok(Json(resp))
}

/// DELETE /api/v1/threads/{id} - Stop the thread's relay and delete it.
pub async fn delete_thread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
) -> Result<Json<Envelope<DeleteThreadResponse>>, AppError> {
    let start = Instant::now();
    let thread_id = parse_uuid(&thread_id)?;

    state.store().authorize_thread(&thread_id, &user_id).await?;
    let stopped = state.pump.stop(&thread_id) == CancelOutcome::Cancelled;
    state.store().delete_thread(&thread_id).await?;
    tracing::info!(%thread_id, stopped, "thread deleted");

    Ok(Json(Envelope::ok(
        DeleteThreadResponse {
            thread_id,
            deleted: true,
            stopped,
        },
        start,
    )))
}

/// GET /api/v1/messages/{id} - A single message owned by the caller.
pub async fn get_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<Envelope<ChatMessage>>, AppError> {
    let start = Instant::now();
    let message_id = parse_uuid(&message_id)?;

    let message = state
        .store()
        .get_message(&message_id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {message_id} not found")))?;

    Ok(Json(Envelope::ok(message, start)))
}

/// GET /api/v1/usage - Message count and total content length for the caller.
pub async fn usage(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<UsageSummary>>, AppError> {
    let start = Instant::now();
    let summary = state.store().usage_summary(&user_id).await?;
    Ok(Json(Envelope::ok(summary, start)))
}
