//! JSON envelope shared by every non-streaming endpoint.
//!
//! Success bodies carry `data`, failures carry `errors`, and both carry
//! `meta` (request id, timestamp, elapsed milliseconds). Related endpoints
//! go under `_links`.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
    #[serde(rename = "_links", skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
}

impl Meta {
    fn stamp(elapsed_ms: u64) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            response_time_ms: elapsed_ms,
        }
    }
}

/// Machine-readable code plus a message for humans.
#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap `data`, timing the request from `start`.
    pub fn ok(data: T, start: Instant) -> Self {
        let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Self {
            data: Some(data),
            meta: Meta::stamp(elapsed),
            errors: Vec::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn link(mut self, rel: &'static str, href: String) -> Self {
        self.links.insert(rel, href);
        self
    }
}

impl Envelope<()> {
    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            data: None,
            meta: Meta::stamp(0),
            errors: vec![ErrorEntry {
                code,
                message: message.into(),
            }],
            links: BTreeMap::new(),
        }
    }
}
