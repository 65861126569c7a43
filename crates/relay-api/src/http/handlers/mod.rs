//! HTTP request handlers.

pub mod chat;
pub mod stats;
pub mod stream;
pub mod transcript;
pub mod ws;

use uuid::Uuid;

use relay_core::chat::repository::TranscriptStore;
use relay_types::error::RepositoryError;

use crate::http::error::AppError;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// Ownership check for a thread that may not have been created yet.
///
/// Unknown threads are allowed; a thread owned by someone else is not.
pub(crate) async fn authorize_open_thread(
    state: &AppState,
    thread_id: &Uuid,
    user_id: &Uuid,
) -> Result<(), AppError> {
    match state.store().authorize_thread(thread_id, user_id).await {
        Ok(_) | Err(RepositoryError::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
