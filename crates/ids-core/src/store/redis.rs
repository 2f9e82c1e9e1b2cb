// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed `StateStore` (spec §4.2). Sorted sets carry the window
//! counters and distinct-value sets; a hash per window carries blobs; TTL is
//! refreshed on every access. Grounded on `ferrex-core`'s `RedisCache`
//! (`ConnectionManager`, typed JSON strings over plain `SET`/`GET`), adapted
//! to sorted-set/TTL primitives this store needs.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::store::{EventBlob, StateStore};

const TTL_GRACE_SEC: i64 = 60;
const WINDOW_PREFIX: &str = "ids:win:";
const COOLDOWN_PREFIX: &str = "ids:cooldown:";

#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub async fn new(redis_url: &str) -> CoreResult<Self> {
        debug!(redis_url, "connecting state store to redis");
        let client = redis::Client::open(redis_url).map_err(|e| {
            CoreError::BackendUnavailable(format!("invalid redis url {redis_url}: {e}"))
        })?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn zset_key(key: &str) -> String {
        format!("{WINDOW_PREFIX}{key}")
    }

    fn blob_key(key: &str) -> String {
        format!("{WINDOW_PREFIX}{key}:blobs")
    }

    fn distinct_key(key: &str) -> String {
        format!("{WINDOW_PREFIX}{key}:dst")
    }

    fn fail_key(key: &str) -> String {
        format!("{WINDOW_PREFIX}{key}:fail")
    }
}

#[async_trait::async_trait]
impl StateStore for RedisStateStore {
    async fn window_record(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        member: &str,
        event_blob: &EventBlob,
        keep_last: usize,
    ) -> CoreResult<(i64, Vec<EventBlob>)> {
        let zkey = Self::zset_key(key);
        let bkey = Self::blob_key(key);
        let ttl = window_sec + TTL_GRACE_SEC;
        let cutoff = ts - window_sec;

        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .zadd(&zkey, member, ts)
            .ignore()
            .hset(&bkey, member, event_blob.as_str())
            .ignore()
            .zrembyscore(&zkey, "-inf", cutoff)
            .ignore()
            .zcard(&zkey)
            .expire(&zkey, ttl)
            .ignore()
            .expire(&bkey, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let members: Vec<String> = conn.zrevrange(&zkey, 0, keep_last.saturating_sub(1) as isize).await?;
        let events = hydrate(&mut conn, &bkey, members).await?;

        Ok((count, events))
    }

    async fn window_distinct_count(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        distinct_value: &str,
    ) -> CoreResult<i64> {
        let zkey = Self::distinct_key(key);
        let ttl = window_sec + TTL_GRACE_SEC;
        let cutoff = ts - window_sec;

        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .zadd(&zkey, distinct_value, ts)
            .ignore()
            .zrembyscore(&zkey, "-inf", cutoff)
            .ignore()
            .zcard(&zkey)
            .expire(&zkey, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn cooldown_hit(&self, dedup_key: &str, cooldown_sec: i64, ts: i64) -> CoreResult<bool> {
        if cooldown_sec <= 0 {
            return Ok(true);
        }
        let key = format!("{COOLDOWN_PREFIX}{dedup_key}");
        let mut conn = self.conn.clone();
        let marker: Option<i64> = conn.get(&key).await?;
        let permit = match marker {
            Some(marker_ts) => ts - marker_ts >= cooldown_sec,
            None => true,
        };
        if permit {
            let _: () = conn.set_ex(&key, ts, cooldown_sec as u64).await?;
        }
        Ok(permit)
    }

    async fn record_fail(&self, key: &str, ts: i64, member: &str, within_sec: i64) -> CoreResult<()> {
        let zkey = Self::fail_key(key);
        let ttl = within_sec + TTL_GRACE_SEC;
        let cutoff = ts - within_sec;
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .zadd(&zkey, member, ts)
            .ignore()
            .zrembyscore(&zkey, "-inf", cutoff)
            .ignore()
            .expire(&zkey, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn had_recent_fail_burst(
        &self,
        key: &str,
        ts: i64,
        within_sec: i64,
        threshold: u32,
    ) -> CoreResult<bool> {
        let zkey = Self::fail_key(key);
        let cutoff = ts - within_sec;
        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .zrembyscore(&zkey, "-inf", cutoff)
            .ignore()
            .zcard(&zkey)
            .query_async(&mut conn)
            .await?;
        Ok(count as u32 >= threshold)
    }

    async fn window_get_events(
        &self,
        key: &str,
        ts: i64,
        window_sec: i64,
        keep_last: usize,
    ) -> CoreResult<Vec<EventBlob>> {
        let zkey = Self::zset_key(key);
        let bkey = Self::blob_key(key);
        let cutoff = ts - window_sec;

        let mut conn = self.conn.clone();
        let _: () = conn.zrembyscore(&zkey, "-inf", cutoff).await?;
        let members: Vec<String> = conn.zrevrange(&zkey, 0, keep_last.saturating_sub(1) as isize).await?;
        hydrate(&mut conn, &bkey, members).await
    }
}

/// Fetch blobs for `members` (most-recent-first order from `ZREVRANGE`),
/// restoring ascending order, skipping missing/corrupt entries rather than
/// failing the whole read.
async fn hydrate(
    conn: &mut ConnectionManager,
    blob_key: &str,
    members: Vec<String>,
) -> CoreResult<Vec<EventBlob>> {
    if members.is_empty() {
        return Ok(Vec::new());
    }
    let blobs: Vec<Option<String>> = conn.hget(blob_key, members).await?;
    Ok(blobs.into_iter().flatten().rev().collect())
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
