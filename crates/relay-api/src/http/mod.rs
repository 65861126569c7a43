//! HTTP layer for relayd.
//!
//! Axum API at `/api/v1/` with envelope responses, SSE and WebSocket
//! delta streaming, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;

#[cfg(test)]
mod test_support;
