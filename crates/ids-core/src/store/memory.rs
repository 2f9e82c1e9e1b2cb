// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process `StateStore`, used in unit tests and as a zero-dependency
//! local/dev backend. Must match `RedisStateStore`'s TTL/eviction/idempotency
//! semantics exactly so the engine is testable without a live Redis.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::error::CoreResult;
use crate::store::{EventBlob, StateStore};

/// Grace period added to `window_sec` for TTL purposes (spec §3: "TTL of
/// `window_sec + grace`"); not otherwise specified, chosen as a fixed
/// constant so expired windows don't linger indefinitely after their last
/// access.
const TTL_GRACE_SEC: i64 = 60;

/// An ordered `(score, member)` set with idempotent upsert: re-inserting an
/// existing member updates its score in place rather than duplicating it.
#[derive(Debug, Default)]
struct ScoreSet {
    by_score: BTreeMap<i64, BTreeSet<String>>,
    by_member: HashMap<String, i64>,
}

impl ScoreSet {
    fn upsert(&mut self, ts: i64, member: &str) {
        if let Some(&old_score) = self.by_member.get(member) {
            if old_score == ts {
                return;
            }
            if let Some(set) = self.by_score.get_mut(&old_score) {
                set.remove(member);
                if set.is_empty() {
                    self.by_score.remove(&old_score);
                }
            }
        }
        self.by_member.insert(member.to_owned(), ts);
        self.by_score.entry(ts).or_default().insert(member.to_owned());
    }

    fn evict_leq(&mut self, max_score: i64) {
        let stale: Vec<i64> = self.by_score.range(..=max_score).map(|(s, _)| *s).collect();
        for score in stale {
            if let Some(members) = self.by_score.remove(&score) {
                for member in members {
                    self.by_member.remove(&member);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.by_member.len()
    }

    fn ordered_members(&self) -> Vec<String> {
        self.by_score.values().flatten().cloned().collect()
    }
}

#[derive(Default)]
struct WindowState {
    counter: ScoreSet,
    distinct: ScoreSet,
    blobs: HashMap<String, EventBlob>,
    expires_at: i64,
}

#[derive(Default)]
pub struct MemoryStateStore {
    windows: Mutex<HashMap<String, WindowState>>,
    cooldowns: Mutex<HashMap<String, i64>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn window_record(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        member: &str,
        event_blob: &EventBlob,
        keep_last: usize,
    ) -> CoreResult<(i64, Vec<EventBlob>)> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let state = windows.entry(key.to_owned()).or_default();

        state.counter.upsert(ts, member);
        state.blobs.insert(member.to_owned(), event_blob.clone());
        state.counter.evict_leq(ts - window_sec);
        state.expires_at = ts + window_sec + TTL_GRACE_SEC;

        let count = state.counter.len() as i64;
        let members = state.counter.ordered_members();
        let events = members
            .iter()
            .rev()
            .take(keep_last)
            .rev()
            .filter_map(|m| state.blobs.get(m).cloned())
            .collect();

        Ok((count, events))
    }

    async fn window_distinct_count(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        distinct_value: &str,
    ) -> CoreResult<i64> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let state = windows.entry(key.to_owned()).or_default();

        state.distinct.upsert(ts, distinct_value);
        state.distinct.evict_leq(ts - window_sec);
        state.expires_at = ts + window_sec + TTL_GRACE_SEC;

        Ok(state.distinct.len() as i64)
    }

    async fn cooldown_hit(&self, dedup_key: &str, cooldown_sec: i64, ts: i64) -> CoreResult<bool> {
        if cooldown_sec <= 0 {
            return Ok(true);
        }
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(|e| e.into_inner());
        let permit = match cooldowns.get(dedup_key) {
            Some(&marker_ts) => ts - marker_ts >= cooldown_sec,
            None => true,
        };
        if permit {
            cooldowns.insert(dedup_key.to_owned(), ts);
        }
        Ok(permit)
    }

    async fn record_fail(&self, key: &str, ts: i64, member: &str, within_sec: i64) -> CoreResult<()> {
        let physical = format!("{key}:fail");
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let state = windows.entry(physical).or_default();
        state.counter.upsert(ts, member);
        state.counter.evict_leq(ts - within_sec);
        state.expires_at = ts + within_sec + TTL_GRACE_SEC;
        Ok(())
    }

    async fn had_recent_fail_burst(
        &self,
        key: &str,
        ts: i64,
        within_sec: i64,
        threshold: u32,
    ) -> CoreResult<bool> {
        let physical = format!("{key}:fail");
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let state = windows.entry(physical).or_default();
        state.counter.evict_leq(ts - within_sec);
        Ok(state.counter.len() as u32 >= threshold)
    }

    async fn window_get_events(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        keep_last: usize,
    ) -> CoreResult<Vec<EventBlob>> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = windows.get_mut(key) else {
            return Ok(Vec::new());
        };
        state.counter.evict_leq(ts - window_sec);
        let members = state.counter.ordered_members();
        Ok(members
            .iter()
            .rev()
            .take(keep_last)
            .rev()
            .filter_map(|m| state.blobs.get(m).cloned())
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
