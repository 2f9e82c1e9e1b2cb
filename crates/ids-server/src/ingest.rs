// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal best-effort field lift from a raw ingest request into a
//! [`NormalizedEvent`] (spec §4.7 / §6's "Ingestion Shell"). This is
//! deliberately **not** the production-grade `message` -> fields parser
//! (explicitly out of scope, spec §1); it exists so the detection engine
//! and ingest contract are both exercisable end to end in this repository.
//! A real deployment replaces this module's output with whatever the real
//! line-parser emits — the engine itself does not care how an event was
//! produced.

use ids_core::NormalizedEvent;
use serde::{Deserialize, Serialize};

/// `POST /api/v1/events` request body (spec §6: "one event descriptor per
/// call: `{source, host, level, message}`").
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub source: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
    /// Caller-assigned opaque identifier of the originating raw record
    /// (spec §6: "the core MUST be invoked only after the ingestion caller
    /// has assigned a `raw_id`"). Generated here when absent since this
    /// shell stands in for that caller.
    #[serde(default)]
    pub raw_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub id: String,
}

/// Lift an [`IngestRequest`] into a [`NormalizedEvent`] at arrival time
/// `ts`, with field extraction limited to the cheap heuristics a dev
/// harness can afford: an IPv4-shaped token as `src_ip`, `key=value` or
/// `key value` tokens for `port`/`path`/`method`/`status_code`, the sshd
/// `for [invalid user ]<user> from` phrase for `username`, and outcome
/// keywords.
pub fn lift_event(req: &IngestRequest, ts: i64, raw_id: String) -> NormalizedEvent {
    let mut event = NormalizedEvent {
        log_source: req.source.clone(),
        ts,
        host: req.host.clone(),
        source: Some(req.source.clone()),
        raw_id: Some(raw_id),
        raw: Some(req.message.clone()),
        ..Default::default()
    };

    let tokens: Vec<&str> = req.message.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if event.src_ip.is_none() && looks_like_ipv4(token) {
            event.src_ip = Some(token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.').to_owned());
            i += 1;
            continue;
        }
        if let Some(port) = lift_kv(token, "port") {
            event.port = port.parse().ok();
            i += 1;
            continue;
        }
        if let Some(status) = lift_kv(token, "status") {
            event.status_code = status.parse().ok();
            i += 1;
            continue;
        }
        if let Some(user) = lift_kv(token, "user").or_else(|| lift_kv(token, "username")) {
            event.username = Some(user);
            i += 1;
            continue;
        }
        // sshd's "Failed/Accepted password for [invalid user ]<user> from <ip>".
        if event.username.is_none() && token.eq_ignore_ascii_case("for") {
            if tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("invalid"))
                && tokens.get(i + 2).is_some_and(|t| t.eq_ignore_ascii_case("user"))
            {
                if let Some(user) = tokens.get(i + 3) {
                    event.username = Some((*user).to_owned());
                    i += 4;
                    continue;
                }
            } else if let Some(user) = tokens.get(i + 1) {
                event.username = Some((*user).to_owned());
                i += 2;
                continue;
            }
        }
        if token.starts_with('/') {
            event.path = Some(token.trim_end_matches(|c: char| matches!(c, ',' | ';' | '"')).to_owned());
            i += 1;
            continue;
        }
        if matches!(token, "GET" | "POST" | "PUT" | "DELETE" | "HEAD" | "PATCH") {
            event.method = Some(token.to_owned());
        }
        i += 1;
    }

    let lowered = req.message.to_lowercase();
    event.outcome = if lowered.contains("fail") || lowered.contains("invalid") || lowered.contains("denied") {
        Some("fail".to_owned())
    } else if lowered.contains("success") || lowered.contains("accepted") {
        Some("success".to_owned())
    } else {
        None
    };

    event
}

fn lift_kv(token: &str, key: &str) -> Option<String> {
    let rest = token.strip_prefix(key)?;
    let rest = rest.strip_prefix('=').or_else(|| rest.strip_prefix(':'))?;
    let value = rest.trim_matches(|c: char| matches!(c, ',' | ';' | '"'));
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn looks_like_ipv4(token: &str) -> bool {
    let cleaned = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.');
    let parts: Vec<&str> = cleaned.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| !p.is_empty() && p.parse::<u8>().is_ok())
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
