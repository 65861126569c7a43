//! WebSocket transport for a thread's relay.
//!
//! GET /api/v1/threads/{id}/ws
//!
//! The socket carries the same `DeltaEnvelope` JSON as the SSE stream, and
//! also accepts commands so a client can ask and stop over one connection:
//!
//! - `{"type":"ask","model":"...","messages":[...]}` starts a cycle, answered
//!   with `{"type":"ack","command":"ask",...}`
//! - `{"type":"stop"}` cancels the running cycle, answered with
//!   `{"type":"ack","command":"stop","status":"stopped"|"no_active_session"}`
//! - `{"type":"ping"}` is answered with `{"type":"pong"}`
//!
//! Failed or malformed commands are answered with
//! `{"type":"error","code":"...","message":"..."}`.
//!
//! Unlike SSE, the socket outlives a single reply: once a cycle finishes
//! the handler attaches to the thread again and waits for the next one.
//! Closing the socket cancels the running cycle.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use relay_core::relay::dispatcher::DeltaSubscription;
use relay_core::relay::pump::RelayRequest;
use relay_types::llm::Message;
use relay_types::relay::DeltaEnvelope;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::handlers::chat::{stop_status, watch_cycle};
use crate::http::handlers::{authorize_open_thread, parse_uuid};
use crate::state::AppState;

/// Incoming command from a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Ask {
        #[serde(default)]
        model: String,
        #[serde(default)]
        messages: Vec<Message>,
    },
    Stop,
    Ping,
}

/// Upgrade to a WebSocket bound to one thread.
///
/// The subscriber slot is claimed before upgrading, so a thread that
/// already has a live subscriber is refused with 409.
pub async fn ws_thread(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let thread_id = parse_uuid(&thread_id)?;
    authorize_open_thread(&state, &thread_id, &user_id).await?;
    let subscription = DeltaSubscription::attach(state.pump.registry().clone(), thread_id, user_id)?;

    Ok(ws.on_upgrade(move |socket| {
        handle_ws_connection(socket, state, user_id, thread_id, subscription)
    }))
}

/// Multiplex outgoing deltas and incoming commands on one task.
async fn handle_ws_connection(
    socket: WebSocket,
    state: AppState,
    user_id: Uuid,
    thread_id: Uuid,
    subscription: DeltaSubscription,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut subscription = Some(subscription);

    loop {
        tokio::select! {
            envelope = next_delta(&mut subscription, &state, thread_id, user_id) => {
                let envelope = match envelope {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        // The thread can no longer be followed from this socket.
                        let (_, code, message) = err.parts();
                        let _ = ws_sender.send(WsMessage::Text(error_frame(code, &message).into())).await;
                        break;
                    }
                };
                match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        if ws_sender.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!("Failed to serialize delta: {err}"),
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(WsMessage::Text(text))) => {
                        let reply = process_command(text.as_str(), &state, user_id, thread_id).await;
                        if ws_sender.send(WsMessage::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary, ping and pong frames are handled by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Dropping the subscription cancels a cycle still streaming to us.
    drop(subscription);
    tracing::debug!(%thread_id, "WebSocket connection closed");
}

/// Next delta for the socket, re-attaching after each finished cycle.
///
/// Ownership is checked again before every re-attach, since the thread
/// may have been claimed by another user while the socket sat idle.
async fn next_delta(
    subscription: &mut Option<DeltaSubscription>,
    state: &AppState,
    thread_id: Uuid,
    user_id: Uuid,
) -> Result<DeltaEnvelope, AppError> {
    loop {
        if let Some(current) = subscription.as_mut() {
            if let Some(envelope) = current.next().await {
                return Ok(envelope);
            }
        }
        // Release the finished channel before claiming a fresh one.
        subscription.take();
        authorize_open_thread(state, &thread_id, &user_id).await?;
        let next = DeltaSubscription::attach(state.pump.registry().clone(), thread_id, user_id)?;
        *subscription = Some(next);
    }
}

/// Parse and run a single client command, returning the reply frame.
async fn process_command(text: &str, state: &AppState, user_id: Uuid, thread_id: Uuid) -> String {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket command");
            return error_frame("INVALID_COMMAND", &err.to_string());
        }
    };

    match cmd {
        WsCommand::Ask { model, messages } => {
            let request = RelayRequest {
                thread_id,
                user_id,
                model: model.clone(),
                messages,
            };
            match state.pump.start(request).await {
                Ok(ticket) => {
                    let provider = ticket.provider;
                    let (user_message_id, generation) = watch_cycle(ticket);
                    json!({
                        "type": "ack",
                        "command": "ask",
                        "thread_id": thread_id,
                        "user_message_id": user_message_id,
                        "generation": generation,
                        "model": model,
                        "provider": provider,
                    })
                    .to_string()
                }
                Err(e) => {
                    let (_, code, message) = AppError::from(e).parts();
                    error_frame(code, &message)
                }
            }
        }
        WsCommand::Stop => {
            if let Err(e) = authorize_open_thread(state, &thread_id, &user_id).await {
                let (_, code, message) = e.parts();
                return error_frame(code, &message);
            }
            let outcome = state.pump.stop(&thread_id);
            json!({
                "type": "ack",
                "command": "stop",
                "thread_id": thread_id,
                "status": stop_status(outcome),
            })
            .to_string()
        }
        WsCommand::Ping => json!({ "type": "pong" }).to_string(),
    }
}

fn error_frame(code: &str, message: &str) -> String {
    json!({ "type": "error", "code": code, "message": message }).to_string()
}
