//! Tracing setup for `relayd`.

pub mod tracing_setup;
