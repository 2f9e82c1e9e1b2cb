// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized event: the engine's single input type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A normalized log event. `log_source` and `ts` are the only required
/// fields; everything else is optional and rules declare which fields they
/// need via `require`/`match`/`*_regex`/`group_by`/`distinct_on`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NormalizedEvent {
    pub log_source: String,
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Catch-all for source-specific fields not promoted to a named slot
    /// above (e.g. `service`, used by dedup-key templates). Rules reference
    /// these the same way as named fields.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NormalizedEvent {
    /// Look up a field by name, checking named slots first and falling back
    /// to `extra`. Returns a display-ready string, or `None` if absent/empty.
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            "log_source" => Some(self.log_source.clone()),
            "ts" => Some(self.ts.to_string()),
            "host" => self.host.clone(),
            "source" => self.source.clone(),
            "raw_id" => self.raw_id.clone(),
            "src_ip" => self.src_ip.clone(),
            "username" => self.username.clone(),
            "outcome" => self.outcome.clone(),
            "port" => self.port.map(|p| p.to_string()),
            "path" => self.path.clone(),
            "method" => self.method.clone(),
            "status_code" => self.status_code.map(|c| c.to_string()),
            "raw" => self.raw.clone(),
            other => self.extra.get(other).map(value_to_display),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Truncate `raw` to a maximum byte length, used when compacting an
    /// event into evidence-snapshot storage.
    pub fn truncated_raw(&self, max_len: usize) -> Option<String> {
        self.raw.as_ref().map(|r| {
            if r.len() > max_len {
                r.chars().take(max_len).collect()
            } else {
                r.clone()
            }
        })
    }
}

/// Compact evidence snapshot stored in a window's blob map and shown in an
/// alert's `events` array (`ts, attack_ip, ip, user, port, path, raw, host,
/// source, raw_id`). `attack_ip`/`ip` and `user`/`username` are kept as
/// separate keys for evidence-consumer compatibility even though both
/// pairs are always populated from the same source field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEvent {
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
}

impl NormalizedEvent {
    /// Compact snapshot suitable for window-state storage and alert evidence.
    pub fn to_evidence(&self, raw_max_len: usize) -> EvidenceEvent {
        EvidenceEvent {
            ts: self.ts,
            attack_ip: self.src_ip.clone(),
            ip: self.src_ip.clone(),
            user: self.username.clone(),
            username: self.username.clone(),
            port: self.port,
            path: self.path.clone(),
            raw: self.truncated_raw(raw_max_len),
            host: self.host.clone(),
            source: self.source.clone(),
            raw_id: self.raw_id.clone(),
        }
    }
}

fn value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
