//! SSE delta stream.
//!
//! GET /api/v1/threads/{id}/stream
//!
//! Each delta is sent as one `data:` line holding a JSON `DeltaEnvelope`,
//! written as soon as it leaves the thread's channel. The stream ends when
//! the running cycle finishes; if a newer request supersedes it, the
//! stream carries on with the new reply. Disconnecting cancels the cycle.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};

use relay_core::relay::dispatcher::DeltaSubscription;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::handlers::{authorize_open_thread, parse_uuid};
use crate::state::AppState;

/// GET /api/v1/threads/{id}/stream - Server-Sent Events of reply deltas.
pub async fn stream_thread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let thread_id = parse_uuid(&thread_id)?;
    authorize_open_thread(&state, &thread_id, &user_id).await?;

    let subscription = DeltaSubscription::attach(state.pump.registry().clone(), thread_id, user_id)?;
    tracing::debug!(%thread_id, generation = subscription.generation(), "SSE subscriber connected");

    let events = subscription.map(|envelope| Event::default().json_data(envelope));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
