//! Transcript persistence abstractions.
//!
//! This module defines the `TranscriptStore` trait that the infrastructure
//! layer implements for threads and messages.

pub mod repository;
