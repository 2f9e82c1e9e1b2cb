// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window state store (spec §4.2): ordered `(score=ts, member)` sets
//! with score-range eviction, a keyed blob map per window, and a shared TTL
//! refreshed on every access. Backend-agnostic behind [`StateStore`].

pub mod memory;
pub mod redis;

use crate::error::CoreResult;

/// A compact event snapshot stored alongside a window member, hydrated back
/// out by [`StateStore::window_get_events`] / [`StateStore::window_record`].
pub type EventBlob = String;

/// Sliding-window state store (spec §4.2). All operations are keyed by a
/// caller-constructed `key` (typically `"{rule_id}:{group_key}"` or a
/// `:fail`/`:evt` suffixed variant); the store itself is opaque to rule
/// semantics.
///
/// Every window's three structures (counter set, distinct set, blob map)
/// share a TTL of `window_sec + grace`, refreshed on every access — callers
/// never manage TTL directly.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Atomically: insert `(ts, member)`, store `member -> event_blob`, evict
    /// entries with score `<= ts - window_sec`, read cardinality, refresh
    /// TTL, then hydrate up to `keep_last` most-recent blobs (ascending by
    /// score). Hydration skips missing/corrupt blobs rather than failing.
    async fn window_record(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        member: &str,
        event_blob: &EventBlob,
        keep_last: usize,
    ) -> CoreResult<(i64, Vec<EventBlob>)>;

    /// Like `window_record` but on the key's distinct-value set: re-inserting
    /// the same `distinct_value` updates its score rather than adding a new
    /// entry, so cardinality reflects distinct values only.
    async fn window_distinct_count(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        distinct_value: &str,
    ) -> CoreResult<i64>;

    /// Returns `true` (permit emission) when `cooldown_sec <= 0`, no marker
    /// exists yet, or the marker is older than `cooldown_sec`. In both
    /// permitting cases the marker is written/refreshed as a side effect.
    /// Returns `false` (suppress) otherwise. `true` always means "allowed to
    /// fire" — never invert this polarity.
    async fn cooldown_hit(&self, dedup_key: &str, cooldown_sec: i64, ts: i64) -> CoreResult<bool>;

    /// Record a failure for sequence correlation, keyed by `"{key}:fail"`
    /// internally. `member` must be unique per failing event (e.g. its
    /// `raw_id`) — two failures sharing a `ts` must not collapse into one
    /// entry, since ordinary ingest traffic is whole-second stamped and a
    /// burst can easily land on the same second.
    async fn record_fail(&self, key: &str, ts: i64, member: &str, within_sec: i64) -> CoreResult<()>;

    /// Whether at least `threshold` failures landed in the trailing
    /// `within_sec` window ending at `ts`.
    async fn had_recent_fail_burst(
        &self,
        key: &str,
        ts: i64,
        within_sec: i64,
        threshold: u32,
    ) -> CoreResult<bool>;

    /// Read-only variant of `window_record`'s hydration step: the last
    /// `keep_last` blobs in the window ending at `ts`, without inserting or
    /// evicting.
    async fn window_get_events(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        keep_last: usize,
    ) -> CoreResult<Vec<EventBlob>>;
}

pub type SharedStateStore = std::sync::Arc<dyn StateStore>;
