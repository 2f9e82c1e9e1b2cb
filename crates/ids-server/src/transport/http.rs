// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ids_core::{Alert, NormalizedEvent};

use crate::ingest::{lift_event, IngestRequest, IngestResponse};
use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub rule_count: usize,
    pub rule_engine_enabled: bool,
}

pub async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let catalog = state.loader.catalog().await;
    Json(HealthResponse {
        status: "ok".to_owned(),
        rule_count: catalog.len(),
        rule_engine_enabled: state.config.rule_engine_enabled,
    })
}

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    #[serde(default)]
    pub debug: Option<String>,
}

impl DebugQuery {
    fn enabled(&self) -> bool {
        matches!(self.debug.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct DebugIngestResponse {
    pub ok: bool,
    pub id: String,
    pub event: NormalizedEvent,
    pub alert_ids: Vec<String>,
    pub errors: Vec<String>,
}

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// `POST /api/v1/events` (spec §6). Always returns 2xx when the event was
/// accepted for processing (spec §7): detection failures never reject
/// ingest. `?debug=1` additionally echoes the lifted event, any alert ids
/// triggered, and per-rule evaluation errors.
pub async fn ingest_event(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DebugQuery>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    let raw_id = req.raw_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ts = now_ts();
    let event = lift_event(&req, ts, raw_id.clone());

    // Best-effort: ingest never fails the caller if the bus append fails
    // (spec §7: "swallowed ... event is still processed by the detection
    // engine if the state store is reachable").
    if let Err(e) = state.bus.append("events", flatten_event(&event)).await {
        warn!(error = %e, "failed to append raw event to bus");
    }

    let alerts = if state.config.rule_engine_enabled {
        state.engine.evaluate(&event).await
    } else {
        Vec::new()
    };

    let mut alert_ids = Vec::with_capacity(alerts.len());
    for alert in &alerts {
        if let Err(e) = state.bus.append("alerts", flatten_alert(alert)).await {
            warn!(error = %e, rule_id = %alert.rule_id, "failed to append alert to bus");
        }
        alert_ids.push(alert.id.clone());
    }

    if !alert_ids.is_empty() {
        info!(count = alert_ids.len(), raw_id = %raw_id, "alerts emitted for ingested event");
    }

    if query.enabled() {
        Json(DebugIngestResponse { ok: true, id: raw_id, event, alert_ids, errors: Vec::new() })
            .into_response()
    } else {
        Json(IngestResponse { ok: true, id: raw_id }).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub rule_count: usize,
    pub failures: Vec<String>,
}

/// `POST /api/v1/rules/reload` (spec §4.1 `reload()`, expansion §6).
pub async fn reload_rules(State(state): State<Arc<ServerState>>) -> Json<ReloadResponse> {
    let failures = state.loader.reload().await;
    let catalog = state.loader.catalog().await;
    for failure in &failures {
        warn!(path = %failure.path.display(), reason = %failure.reason, "rule reload rejected file");
    }
    Json(ReloadResponse {
        rule_count: catalog.len(),
        failures: failures.into_iter().map(|f| format!("{}: {}", f.path.display(), f.reason)).collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub severity: String,
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleSummary>,
}

/// `GET /api/v1/rules` (expansion §6): operational visibility into the
/// active catalog.
pub async fn list_rules(State(state): State<Arc<ServerState>>) -> Json<RulesResponse> {
    let catalog = state.loader.catalog().await;
    let rules = catalog
        .enabled_rules()
        .map(|r| RuleSummary {
            id: r.id.clone(),
            name: r.name.clone(),
            enabled: r.enabled,
            severity: r.severity.as_str().to_owned(),
        })
        .collect();
    Json(RulesResponse { rules })
}

/// Flatten a [`NormalizedEvent`] into the bus's all-string field mapping
/// (spec §4.5: "a flat field mapping (all string-valued)").
fn flatten_event(event: &NormalizedEvent) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("log_source".to_owned(), event.log_source.clone());
    fields.insert("ts".to_owned(), event.ts.to_string());
    insert_opt(&mut fields, "host", &event.host);
    insert_opt(&mut fields, "source", &event.source);
    insert_opt(&mut fields, "raw_id", &event.raw_id);
    insert_opt(&mut fields, "src_ip", &event.src_ip);
    insert_opt(&mut fields, "username", &event.username);
    insert_opt(&mut fields, "outcome", &event.outcome);
    if let Some(port) = event.port {
        fields.insert("port".to_owned(), port.to_string());
    }
    insert_opt(&mut fields, "path", &event.path);
    insert_opt(&mut fields, "method", &event.method);
    if let Some(status) = event.status_code {
        fields.insert("status_code".to_owned(), status.to_string());
    }
    insert_opt(&mut fields, "raw", &event.raw);
    fields
}

/// Flatten an [`Alert`] into the bus's all-string field mapping; nested
/// structures (`extra`, `assessment`) are carried as JSON-encoded strings
/// (spec §4.4: "complex structures must be serializable by callers to text
/// for persistence").
fn flatten_alert(alert: &Alert) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_owned(), alert.id.clone());
    fields.insert("rule_id".to_owned(), alert.rule_id.clone());
    fields.insert("rule_name".to_owned(), alert.rule_name.clone());
    fields.insert("rule_title".to_owned(), alert.rule_title.clone());
    fields.insert("rule_desc".to_owned(), alert.rule_desc.clone());
    fields.insert("rule_why".to_owned(), alert.rule_why.clone());
    fields.insert("rule_advice".to_owned(), alert.rule_advice.clone());
    fields.insert("severity".to_owned(), alert.severity.clone());
    fields.insert("tags".to_owned(), alert.tags.join(","));
    fields.insert("log_source".to_owned(), alert.log_source.clone());
    fields.insert("group_key".to_owned(), alert.group_key.clone());
    insert_opt(&mut fields, "src_ip", &alert.src_ip);
    insert_opt(&mut fields, "username", &alert.username);
    fields.insert("host".to_owned(), alert.host.clone());
    if let Some(port) = alert.port {
        fields.insert("port".to_owned(), port.to_string());
    }
    fields.insert("ts".to_owned(), alert.ts.to_string());
    insert_opt(&mut fields, "raw_id", &alert.raw_id);
    fields.insert(
        "extra".to_owned(),
        serde_json::to_string(&alert.extra).unwrap_or_default(),
    );
    fields.insert(
        "assessment".to_owned(),
        serde_json::to_string(&alert.assessment).unwrap_or_default(),
    );
    fields.insert("human_summary".to_owned(), alert.human_summary.clone());
    fields
}

fn insert_opt(fields: &mut BTreeMap<String, String>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        fields.insert(key.to_owned(), v.clone());
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
