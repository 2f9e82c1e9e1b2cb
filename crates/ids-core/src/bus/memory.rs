// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bounded stream bus, used in tests and as the zero-dependency
//! local/dev backend. A bounded circular buffer generalized from a byte
//! ring to an entry ring with monotonic ids and `tokio::sync::Notify` for
//! tail-blocking instead of byte offsets.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::bus::{EventBus, StreamEntry, StreamId, ZERO_ID};
use crate::error::CoreResult;

const DEFAULT_CAP: usize = 1_000;

struct Stream {
    entries: Mutex<VecDeque<StreamEntry>>,
    cap: usize,
    next_seq: AtomicU64,
    notify: Notify,
}

impl Stream {
    fn new(cap: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), cap, next_seq: AtomicU64::new(1), notify: Notify::new() }
    }
}

pub struct MemoryEventBus {
    streams: Mutex<HashMap<String, std::sync::Arc<Stream>>>,
    events_cap: usize,
    alerts_cap: usize,
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::with_caps(5_000, 2_000)
    }

    /// Construct with explicit caps for the `events`/`alerts` streams (spec
    /// §6 config contract: "stream cap sizes" is a process-wide setting).
    /// Any other stream name falls back to a small fixed default.
    pub fn with_caps(events_cap: usize, alerts_cap: usize) -> Self {
        Self { streams: Mutex::new(HashMap::new()), events_cap, alerts_cap }
    }

    fn cap_for(&self, stream: &str) -> usize {
        match stream {
            "events" => self.events_cap,
            "alerts" => self.alerts_cap,
            _ => DEFAULT_CAP,
        }
    }

    fn stream(&self, name: &str) -> std::sync::Arc<Stream> {
        let cap = self.cap_for(name);
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        streams.entry(name.to_owned()).or_insert_with(|| std::sync::Arc::new(Stream::new(cap))).clone()
    }
}

fn seq_of(id: &str) -> u64 {
    id.split('-').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[async_trait::async_trait]
impl EventBus for MemoryEventBus {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> CoreResult<StreamId> {
        let s = self.stream(stream);
        let seq = s.next_seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("{seq}-0");

        let mut entries = s.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(StreamEntry { id: id.clone(), fields });
        while entries.len() > s.cap {
            entries.pop_front();
        }
        drop(entries);
        s.notify.notify_waiters();

        Ok(id)
    }

    async fn latest_id(&self, stream: &str) -> CoreResult<StreamId> {
        let s = self.stream(stream);
        let entries = s.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.back().map(|e| e.id.clone()).unwrap_or_else(|| ZERO_ID.to_owned()))
    }

    async fn tail(
        &self,
        stream: &str,
        after_id: &str,
        block_ms: u64,
        count: usize,
    ) -> CoreResult<Vec<StreamEntry>> {
        let s = self.stream(stream);
        let after = seq_of(after_id);

        let collect = |s: &Stream| -> Vec<StreamEntry> {
            let entries = s.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.iter().filter(|e| seq_of(&e.id) > after).take(count).cloned().collect()
        };

        let found = collect(&s);
        if !found.is_empty() {
            return Ok(found);
        }

        let notified = s.notify.notified();
        let _ = tokio::time::timeout(Duration::from_millis(block_ms), notified).await;
        Ok(collect(&s))
    }

    async fn ensure_exists(&self, stream: &str) -> CoreResult<()> {
        let _ = self.stream(stream);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
