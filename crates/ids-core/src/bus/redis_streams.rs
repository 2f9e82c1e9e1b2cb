// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis Streams-backed `EventBus` (spec §4.5). `XADD ... MAXLEN ~ <cap>`
//! bounds memory approximately; `XREVRANGE` answers `latest_id`; `XREAD
//! BLOCK <ms> COUNT <count>` implements blocking `tail`. Stream entry ids are
//! the native Redis `<ms>-<seq>` ids, opaque to callers.

use std::collections::BTreeMap;

use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::debug;

use crate::bus::{EventBus, StreamEntry, StreamId, ZERO_ID};
use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct RedisStreamBus {
    conn: ConnectionManager,
    events_cap: usize,
    alerts_cap: usize,
}

impl RedisStreamBus {
    pub async fn new(redis_url: &str) -> CoreResult<Self> {
        Self::with_caps(redis_url, 5_000, 2_000).await
    }

    /// Connect with explicit caps for the `events`/`alerts` streams (spec §6
    /// config contract).
    pub async fn with_caps(redis_url: &str, events_cap: usize, alerts_cap: usize) -> CoreResult<Self> {
        debug!(redis_url, "connecting event bus to redis");
        let client = redis::Client::open(redis_url).map_err(|e| {
            CoreError::BackendUnavailable(format!("invalid redis url {redis_url}: {e}"))
        })?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, events_cap, alerts_cap })
    }

    fn cap_for(&self, stream: &str) -> usize {
        match stream {
            "events" => self.events_cap,
            "alerts" => self.alerts_cap,
            _ => 1_000,
        }
    }
}

#[async_trait::async_trait]
impl EventBus for RedisStreamBus {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> CoreResult<StreamId> {
        let mut conn = self.conn.clone();
        let items: Vec<(String, String)> = fields.into_iter().collect();
        let id: String = conn
            .xadd_maxlen(stream, StreamMaxlen::Approx(self.cap_for(stream)), "*", &items)
            .await?;
        Ok(id)
    }

    async fn latest_id(&self, stream: &str) -> CoreResult<StreamId> {
        let mut conn = self.conn.clone();
        let entries: redis::streams::StreamRangeReply =
            conn.xrevrange_count(stream, "+", "-", 1).await?;
        Ok(entries.ids.first().map(|e| e.id.clone()).unwrap_or_else(|| ZERO_ID.to_owned()))
    }

    async fn tail(
        &self,
        stream: &str,
        after_id: &str,
        block_ms: u64,
        count: usize,
    ) -> CoreResult<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default().count(count).block(block_ms as usize);
        let reply: StreamReadReply = conn.xread_options(&[stream], &[after_id], &opts).await?;

        let mut out = Vec::new();
        for key in reply.keys {
            for id_entry in key.ids {
                let mut fields = BTreeMap::new();
                for (k, v) in id_entry.map {
                    if let redis::Value::BulkString(bytes) = v {
                        fields.insert(k, String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                out.push(StreamEntry { id: id_entry.id, fields });
            }
        }
        Ok(out)
    }

    async fn ensure_exists(&self, stream: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        // XGROUP CREATE with MKSTREAM is the idiomatic idempotent way to
        // ensure a stream exists without appending a throwaway entry;
        // BUSYGROUP on an existing group is the expected, ignorable outcome.
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg("ids-core")
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "redis_streams_tests.rs"]
mod tests;
