//! Relay statistics endpoint.
//!
//! GET /api/v1/relay/stats - Counters since process start.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use relay_types::relay::RelayStatsSnapshot;

use crate::http::extractors::auth::AuthUser;
use crate::http::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RelayStatsResponse {
    #[serde(flatten)]
    pub counters: RelayStatsSnapshot,
    pub channel_capacity: usize,
    pub uptime_secs: u64,
}

/// GET /api/v1/relay/stats - Cycle and delta counters.
pub async fn relay_stats(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Json<Envelope<RelayStatsResponse>> {
    let start = Instant::now();
    let registry = state.pump.registry();

    let data = RelayStatsResponse {
        counters: state.pump.stats().snapshot(registry.active_sessions()),
        channel_capacity: registry.capacity(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    };

    Json(Envelope::ok(data, start))
}
