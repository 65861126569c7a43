//! The streaming relay.
//!
//! - `SessionRegistry`: one live output channel per thread
//! - `RelayPump`: producer side, upstream deltas into the channel
//! - `DeltaSubscription`: consumer side, channel into client envelopes
//! - `RelayStats`: process-wide counters

pub mod dispatcher;
pub mod pump;
pub mod registry;
pub mod stats;
