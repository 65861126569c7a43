//! Relay engine and port definitions for the chat relay.
//!
//! This crate defines the "ports" (storage and provider traits) that the
//! infrastructure layer implements, plus the streaming relay itself: the
//! model gateway, the per-thread session registry, the producer pump and
//! the consumer-side delta subscription. It depends only on `relay-types`
//! -- never on `relay-infra` or any database/IO crate.

pub mod chat;
pub mod llm;
pub mod relay;

/// Scripted provider and in-memory store for tests, here and downstream.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
