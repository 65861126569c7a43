//! Chat send and stop endpoint.
//!
//! POST /api/v1/threads/{id}/messages
//!
//! Starts a relay cycle for the thread and returns as soon as the producer
//! is running; the reply is delivered on the thread's SSE or WebSocket
//! stream. With `?stop=true` the running cycle is cancelled instead and
//! the body is ignored.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relay_core::relay::pump::{RelayRequest, RelayTicket};
use relay_types::llm::{Message, ProviderKind};
use relay_types::relay::CancelOutcome;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::handlers::{authorize_open_thread, parse_uuid};
use crate::http::response::Envelope;
use crate::state::AppState;

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    pub model: String,
    /// Full ordered history; the last entry is the new user message.
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageQuery {
    #[serde(default)]
    pub stop: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub thread_id: Uuid,
    pub user_message_id: Uuid,
    pub generation: u64,
    pub model: String,
    pub provider: ProviderKind,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub thread_id: Uuid,
    pub status: &'static str,
}

/// Wire status for a stop request.
pub(crate) fn stop_status(outcome: CancelOutcome) -> &'static str {
    match outcome {
        CancelOutcome::Cancelled => "stopped",
        CancelOutcome::NotFound => "no_active_session",
    }
}

/// Detach the cycle task, logging it if it panics. Normal endings are logged by the cycle.
pub(crate) fn watch_cycle(ticket: RelayTicket) -> (Uuid, u64) {
    let RelayTicket {
        thread_id,
        user_message_id,
        generation,
        handle,
        ..
    } = ticket;
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            tracing::error!(%thread_id, generation, error = %e, "relay cycle task failed");
        }
    });
    (user_message_id, generation)
}

/// POST /api/v1/threads/{id}/messages - Send a message, or stop with `?stop=true`.
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
    Query(query): Query<SendMessageQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let thread_id = parse_uuid(&thread_id)?;

    if query.stop {
        authorize_open_thread(&state, &thread_id, &user_id).await?;
        let outcome = state.pump.stop(&thread_id);
        let resp = Envelope::ok(
            StopResponse {
                thread_id,
                status: stop_status(outcome),
            },
            start,
        );
        return Ok(Json(resp).into_response());
    }

    let body: SendMessageBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?;
    let model = body.model.clone();

    let ticket = state
        .pump
        .start(RelayRequest {
            thread_id,
            user_id,
            model: body.model,
            messages: body.messages,
        })
        .await?;
    let provider = ticket.provider;
    let (user_message_id, generation) = watch_cycle(ticket);

    let resp = Envelope::ok(
        SendMessageResponse {
            thread_id,
            user_message_id,
            generation,
            model,
            provider,
        },
        start,
    )
    .link("stream", format!("/api/v1/threads/{thread_id}/stream"))
    .link("messages", format!("/api/v1/threads/{thread_id}/messages"));

    Ok((StatusCode::ACCEPTED, Json(resp)).into_response())
}
