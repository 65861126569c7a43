//! Authenticated user extractor.
//!
//! Authentication happens upstream; the gateway in front of relayd sets
//! `X-User-Id` to the caller's UUID. The header is trusted as-is.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::http::error::AppError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(USER_ID_HEADER).ok_or_else(|| {
            AppError::Unauthorized("Missing X-User-Id header".to_string())
        })?;
        let raw = value.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-User-Id header encoding".to_string())
        })?;
        let id = raw.trim().parse::<Uuid>().map_err(|_| {
            AppError::Unauthorized("X-User-Id must be a UUID".to_string())
        })?;
        Ok(AuthUser(id))
    }
}
