// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert payload construction. Stateless: every step is a pure
//! function of `(rule, event, group_key, extra)`, so identical inputs
//! produce byte-identical output modulo the generated alert id.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::event::NormalizedEvent;
use crate::rule::Rule;

/// Closed vocabulary for target semantic tags, evaluated in a fixed priority
/// order against the path (first match wins) so tagging is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetTag {
    AdminEntry,
    InfoLeak,
    SourceLeak,
    BackupLeak,
    LoginPage,
    SuspiciousProbe,
    SensitivePath,
}

/// Priority-ordered (path substring, tag) table; first match wins.
const TARGET_TAG_TABLE: &[(&str, TargetTag)] = &[
    ("/admin", TargetTag::AdminEntry),
    ("/phpinfo", TargetTag::InfoLeak),
    ("/.git", TargetTag::SourceLeak),
    ("/.env", TargetTag::SourceLeak),
    ("/backup", TargetTag::BackupLeak),
    (".zip", TargetTag::BackupLeak),
    (".sql", TargetTag::BackupLeak),
    ("/login", TargetTag::LoginPage),
    ("/wp-login", TargetTag::LoginPage),
];

fn tag_for_path(path: &str) -> TargetTag {
    for (needle, tag) in TARGET_TAG_TABLE {
        if path.contains(needle) {
            return *tag;
        }
    }
    TargetTag::SuspiciousProbe
}

#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub url: String,
    pub tag: TargetTag,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub attack_type: String,
    pub risk_level: String,
    pub targets: Vec<Target>,
}

/// Internal host kept for provenance when the displayed host is normalized
/// to a configured public name.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_host: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Not part of spec.md's field list; the one field this builder's
    /// otherwise-pure output varies by, per input (rule, event, group_key,
    /// extra).
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_title: String,
    pub rule_desc: String,
    pub rule_why: String,
    pub rule_advice: String,
    pub severity: String,
    pub tags: Vec<String>,
    pub log_source: String,
    pub group_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub host: String,
    pub asset: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
    pub extra: Map<String, Value>,
    pub assessment: Assessment,
    pub human_summary: String,
}

enum Family {
    Ssh,
    Http,
    Sequence,
    Generic,
}

fn family_of(rule: &Rule) -> Family {
    if matches!(rule.kind, crate::rule::RuleKind::Sequence(_)) {
        return Family::Sequence;
    }
    if rule.log_source.matches("ssh") || rule.tags.iter().any(|t| t == "ssh") {
        return Family::Ssh;
    }
    if rule.log_source.matches("http") || rule.tags.iter().any(|t| t == "http") {
        return Family::Http;
    }
    Family::Generic
}

fn risk_level(severity: &crate::rule::Severity) -> &'static str {
    use crate::rule::Severity::*;
    match severity {
        Info | Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
        Other(_) => "medium",
    }
}

/// Composes structured alert payloads from detection engine output. Holds no
/// mutable state; `public_host` is the only configuration input.
#[derive(Debug, Clone, Default)]
pub struct AlertBuilder {
    public_host: Option<String>,
}

impl AlertBuilder {
    pub fn new(public_host: Option<String>) -> Self {
        Self { public_host }
    }

    pub fn build(
        &self,
        rule: &Rule,
        event: &NormalizedEvent,
        group_key: &str,
        extra: Map<String, Value>,
    ) -> Alert {
        let family = family_of(rule);
        let internal_host = event.host.clone();
        let displayed_host = match family {
            Family::Http => self.public_host.clone().or_else(|| internal_host.clone()),
            _ => internal_host.clone(),
        };
        let host = displayed_host.unwrap_or_default();

        let assessment = match family {
            Family::Ssh => ssh_assessment(rule, event),
            Family::Http => http_assessment(rule, event, &extra),
            Family::Sequence => sequence_assessment(rule),
            Family::Generic => generic_assessment(rule),
        };

        let human_summary = match family {
            Family::Ssh => ssh_summary(rule, event, group_key, &extra),
            Family::Http => http_summary(rule, event, group_key, &extra),
            Family::Sequence => sequence_summary(rule, event, group_key, &extra),
            Family::Generic => generic_summary(rule, event, group_key, &extra),
        };

        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_title: rule.title.clone(),
            rule_desc: rule.desc.clone(),
            rule_why: rule.why.clone(),
            rule_advice: rule.advice.clone(),
            severity: rule.severity.as_str().to_owned(),
            tags: rule.tags.clone(),
            log_source: event.log_source.clone(),
            group_key: group_key.to_owned(),
            src_ip: event.src_ip.clone(),
            username: event.username.clone(),
            host,
            asset: Asset { internal_host },
            port: event.port,
            ts: event.ts,
            raw_id: event.raw_id.clone(),
            extra,
            assessment,
            human_summary,
        }
    }
}

fn ssh_assessment(rule: &Rule, event: &NormalizedEvent) -> Assessment {
    let port = event.port.unwrap_or(22);
    let host = event.host.clone().unwrap_or_default();
    Assessment {
        attack_type: "ssh-bruteforce".to_owned(),
        risk_level: risk_level(&rule.severity).to_owned(),
        targets: vec![Target { url: format!("ssh://{host}:{port}"), tag: TargetTag::SuspiciousProbe }],
    }
}

fn render_url(host: &str, port: Option<i64>, path: &str) -> String {
    let (scheme, default_port) = match port {
        Some(443) => ("https", 443),
        Some(80) => ("http", 80),
        _ => ("http", 80),
    };
    match port {
        Some(p) if p != default_port => format!("{scheme}://{host}:{p}{path}"),
        _ => format!("{scheme}://{host}{path}"),
    }
}

fn http_assessment(rule: &Rule, event: &NormalizedEvent, extra: &Map<String, Value>) -> Assessment {
    let host = event.host.clone().unwrap_or_default();
    let paths: Vec<String> = extra
        .get("events")
        .and_then(Value::as_array)
        .map(|events| {
            events
                .iter()
                .filter_map(|e| e.get("path").and_then(Value::as_str).map(str::to_owned))
                .collect()
        })
        .or_else(|| {
            extra
                .get("paths")
                .and_then(Value::as_array)
                .map(|p| p.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        })
        .unwrap_or_default();

    let targets = paths
        .into_iter()
        .map(|path| Target { url: render_url(&host, event.port, &path), tag: tag_for_path(&path) })
        .collect();

    Assessment {
        attack_type: "http-path-probe".to_owned(),
        risk_level: risk_level(&rule.severity).to_owned(),
        targets,
    }
}

fn sequence_assessment(rule: &Rule) -> Assessment {
    Assessment {
        attack_type: "fail-success-sequence".to_owned(),
        risk_level: risk_level(&rule.severity).to_owned(),
        targets: Vec::new(),
    }
}

fn generic_assessment(rule: &Rule) -> Assessment {
    Assessment {
        attack_type: "window-threshold".to_owned(),
        risk_level: risk_level(&rule.severity).to_owned(),
        targets: Vec::new(),
    }
}

fn ssh_summary(rule: &Rule, event: &NormalizedEvent, group_key: &str, extra: &Map<String, Value>) -> String {
    let ip = event.src_ip.clone().unwrap_or_else(|| "unknown host".to_owned());
    let host = event.host.clone().unwrap_or_default();
    let count = extra.get("count").and_then(Value::as_i64).unwrap_or(0);
    let window_sec = extra.get("window_sec").and_then(Value::as_i64).unwrap_or(0);
    format!(
        "{ip} attempted {count} SSH logins against {host} within {window_sec}s (rule {}, group {group_key})",
        rule.id
    )
}

fn http_summary(rule: &Rule, event: &NormalizedEvent, group_key: &str, extra: &Map<String, Value>) -> String {
    let ip = event.src_ip.clone().unwrap_or_else(|| "unknown host".to_owned());
    let count = extra.get("count").and_then(Value::as_i64).unwrap_or(0);
    let paths: Vec<String> = extra
        .get("events")
        .and_then(Value::as_array)
        .map(|events| {
            events
                .iter()
                .filter_map(|e| e.get("path").and_then(Value::as_str).map(str::to_owned))
                .take(3)
                .collect()
        })
        .unwrap_or_default();
    format!(
        "{ip} probed {count} suspicious paths including {} (rule {}, group {group_key})",
        paths.join(", "),
        rule.id
    )
}

fn sequence_summary(rule: &Rule, event: &NormalizedEvent, group_key: &str, extra: &Map<String, Value>) -> String {
    let ip = event.src_ip.clone().unwrap_or_else(|| "unknown host".to_owned());
    let user = event.username.clone().unwrap_or_default();
    let fail_count = extra.get("fail_count").and_then(Value::as_i64).unwrap_or(0);
    let fail_within_sec = extra.get("fail_within_sec").and_then(Value::as_i64).unwrap_or(0);
    format!(
        "{ip} succeeded as {user} after {fail_count} failures within {fail_within_sec}s (rule {}, group {group_key})",
        rule.id
    )
}

fn generic_summary(rule: &Rule, event: &NormalizedEvent, group_key: &str, extra: &Map<String, Value>) -> String {
    let count = extra
        .get("count")
        .or_else(|| extra.get("distinct_count"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let window_sec = extra.get("window_sec").and_then(Value::as_i64).unwrap_or(0);
    format!(
        "rule {} tripped with count {count} within {window_sec}s for group {group_key} at ts {}",
        rule.id, event.ts
    )
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
