// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detection engine: a pure function of `(event, rule_catalog,
//! state_store)` producing zero or more alerts. Per-rule failures are caught
//! and logged without aborting the rest of the catalog.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::alert::{Alert, AlertBuilder};
use crate::error::{CoreError, CoreResult};
use crate::event::NormalizedEvent;
use crate::rule::loader::RuleLoader;
use crate::rule::{Rule, RuleKind, SequenceSpec};
use crate::store::StateStore;

const EVIDENCE_RAW_MAX_LEN: usize = 512;
const DEFAULT_KEEP_LAST: usize = 50;

/// Per-event, per-rule-call deadline.
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct DetectionEngine {
    loader: Arc<RuleLoader>,
    store: Arc<dyn StateStore>,
    builder: AlertBuilder,
    store_timeout: Duration,
}

impl DetectionEngine {
    pub fn new(loader: Arc<RuleLoader>, store: Arc<dyn StateStore>, builder: AlertBuilder) -> Self {
        Self { loader, store, builder, store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Evaluate one event against the current catalog snapshot, returning
    /// every alert that trips. Never panics; a failing rule is logged and
    /// skipped, the rest of the catalog still evaluates.
    pub async fn evaluate(&self, event: &NormalizedEvent) -> Vec<Alert> {
        if event.ts <= 0 {
            return Vec::new();
        }

        let catalog = self.loader.catalog().await;
        let mut alerts = Vec::new();

        for rule in catalog.enabled_rules() {
            let outcome = match &rule.kind {
                RuleKind::Sequence(seq) => self.evaluate_sequence(rule, seq, event).await,
                RuleKind::Window { .. } => self.evaluate_window(rule, event).await,
            };
            match outcome {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "rule evaluation failed, skipping");
                }
            }
        }

        alerts
    }

    async fn timed<T>(&self, fut: impl Future<Output = CoreResult<T>>) -> CoreResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::BackendUnavailable("state store call timed out".to_owned())),
        }
    }

    async fn evaluate_window(&self, rule: &Rule, event: &NormalizedEvent) -> CoreResult<Option<Alert>> {
        if !predicate_matches(rule, event) {
            return Ok(None);
        }

        let RuleKind::Window { window_sec, threshold, distinct_on } = &rule.kind else {
            unreachable!("evaluate_window called with non-window rule");
        };

        let group_key = group_key(&rule.group_by, event);
        let key_base = format!("{}:{group_key}", rule.id);
        let ts = event.ts;

        let mut extra = Map::new();
        let count = if let Some(fields) = distinct_on {
            let dv = distinct_value(fields, event);
            let cnt = self
                .timed(self.store.window_distinct_count(&key_base, ts, *window_sec, &dv))
                .await?;
            let evidence_key = format!("{key_base}:evt");
            let blob = evidence_blob(event);
            let (_, events) = self
                .timed(self.store.window_record(
                    &evidence_key,
                    ts,
                    *window_sec,
                    &event_member(event),
                    &blob,
                    DEFAULT_KEEP_LAST,
                ))
                .await?;
            extra.insert("distinct_count".to_owned(), Value::from(cnt));
            extra.insert("window_sec".to_owned(), Value::from(*window_sec));
            extra.insert("events".to_owned(), parse_events(&events));
            cnt
        } else {
            let blob = evidence_blob(event);
            let (cnt, events) = self
                .timed(self.store.window_record(
                    &key_base,
                    ts,
                    *window_sec,
                    &event_member(event),
                    &blob,
                    DEFAULT_KEEP_LAST,
                ))
                .await?;
            extra.insert("count".to_owned(), Value::from(cnt));
            extra.insert("window_sec".to_owned(), Value::from(*window_sec));
            extra.insert("events".to_owned(), parse_events(&events));
            cnt
        };

        if count < *threshold {
            return Ok(None);
        }

        let dedup = render_dedup_key(&rule.dedup_key, rule, event);
        let permitted = self.timed(self.store.cooldown_hit(&dedup, rule.cooldown_sec, ts)).await?;
        if !permitted {
            return Ok(None);
        }

        Ok(Some(self.builder.build(rule, event, &group_key, extra)))
    }

    async fn evaluate_sequence(
        &self,
        rule: &Rule,
        seq: &SequenceSpec,
        event: &NormalizedEvent,
    ) -> CoreResult<Option<Alert>> {
        if !predicate_matches(rule, event) {
            return Ok(None);
        }

        let group_key = group_key(&rule.group_by, event);
        let key_base = format!("{}:{group_key}", rule.id);
        let ts = event.ts;

        match event.outcome.as_deref() {
            Some("fail") => {
                let member = event_member(event);
                self.timed(self.store.record_fail(&key_base, ts, &member, seq.fail_within_sec)).await?;
                Ok(None)
            }
            Some("success") => {
                let burst = self
                    .timed(self.store.had_recent_fail_burst(
                        &key_base,
                        ts,
                        seq.fail_within_sec,
                        seq.fail_count,
                    ))
                    .await?;
                if !burst {
                    return Ok(None);
                }

                let dedup = render_dedup_key(&rule.dedup_key, rule, event);
                let permitted =
                    self.timed(self.store.cooldown_hit(&dedup, rule.cooldown_sec, ts)).await?;
                if !permitted {
                    return Ok(None);
                }

                let fail_key = format!("{key_base}:fail");
                let events = self
                    .timed(self.store.window_get_events(
                        &fail_key,
                        ts,
                        seq.fail_within_sec,
                        DEFAULT_KEEP_LAST,
                    ))
                    .await
                    .unwrap_or_default();

                let mut extra = Map::new();
                extra.insert("fail_count".to_owned(), Value::from(seq.fail_count));
                extra.insert("fail_within_sec".to_owned(), Value::from(seq.fail_within_sec));
                extra.insert("events".to_owned(), parse_events(&events));

                Ok(Some(self.builder.build(rule, event, &group_key, extra)))
            }
            _ => Ok(None),
        }
    }
}

fn predicate_matches(rule: &Rule, event: &NormalizedEvent) -> bool {
    if !rule.log_source.matches(&event.log_source) {
        return false;
    }
    for field in &rule.require {
        match event.field(field) {
            Some(v) if !v.is_empty() => {}
            _ => return false,
        }
    }
    for (field, expected) in &rule.r#match {
        match event.field(field) {
            Some(v) if &v == expected => {}
            _ => return false,
        }
    }
    for (field, regex) in &rule.regex {
        match event.field(field) {
            Some(v) if regex.is_match(&v) => {}
            _ => return false,
        }
    }
    true
}

fn group_key(group_by: &[String], event: &NormalizedEvent) -> String {
    if group_by.is_empty() {
        return "global".to_owned();
    }
    group_by
        .iter()
        .map(|f| format!("{f}={}", event.field(f).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("|")
}

fn distinct_value(fields: &[String], event: &NormalizedEvent) -> String {
    fields.iter().map(|f| event.field(f).unwrap_or_default()).collect::<Vec<_>>().join("|")
}

fn event_member(event: &NormalizedEvent) -> String {
    event.raw_id.clone().unwrap_or_else(|| event.ts.to_string())
}

fn evidence_blob(event: &NormalizedEvent) -> String {
    serde_json::to_string(&event.to_evidence(EVIDENCE_RAW_MAX_LEN)).unwrap_or_default()
}

/// Hydrate stored evidence blobs into JSON values for the alert payload,
/// skipping any that fail to parse rather than failing the whole alert.
fn parse_events(blobs: &[String]) -> Value {
    Value::Array(blobs.iter().filter_map(|b| serde_json::from_str(b).ok()).collect())
}

/// Render `{rule_id}`, `{src_ip}`, `{username}`, `{host}`, `{service}` in a
/// dedup-key template; missing fields substitute the empty string.
fn render_dedup_key(template: &str, rule: &Rule, event: &NormalizedEvent) -> String {
    template
        .replace("{rule_id}", &rule.id)
        .replace("{src_ip}", &event.src_ip.clone().unwrap_or_default())
        .replace("{username}", &event.username.clone().unwrap_or_default())
        .replace("{host}", &event.host.clone().unwrap_or_default())
        .replace("{service}", &event.field("service").unwrap_or_default())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
