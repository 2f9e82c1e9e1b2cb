// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only, capped, ordered event/alert stream bus (spec §4.5).
//! Backend-agnostic behind [`EventBus`]; failures are surfaced to callers
//! and the bus reconnects lazily on the next call.

pub mod memory;
pub mod redis_streams;

use std::collections::BTreeMap;

use crate::error::CoreResult;

/// An opaque, totally-ordered entry id within one stream. Cross-stream
/// ordering is not guaranteed. The "zero" id denotes "before any entry" and
/// is what `latest_id` returns for an empty stream.
pub type StreamId = String;

pub const ZERO_ID: &str = "0-0";

/// A single stream entry: its id and a flat, all-string field mapping.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: BTreeMap<String, String>,
}

/// Two append-only capped streams (spec §4.5): one for raw events (cap
/// ≈ 5,000), one for alerts (cap ≈ 2,000). `tail` blocks up to `block_ms`
/// waiting for entries with id > `after_id`, returning as soon as any are
/// available or the timeout elapses.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> CoreResult<StreamId>;

    async fn latest_id(&self, stream: &str) -> CoreResult<StreamId>;

    async fn tail(
        &self,
        stream: &str,
        after_id: &str,
        block_ms: u64,
        count: usize,
    ) -> CoreResult<Vec<StreamEntry>>;

    async fn ensure_exists(&self, stream: &str) -> CoreResult<()>;
}

pub type SharedEventBus = std::sync::Arc<dyn EventBus>;
