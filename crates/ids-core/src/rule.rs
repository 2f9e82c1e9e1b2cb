// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule model and catalog.

pub mod loader;

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A log-source filter: a single tag or a set of acceptable tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogSourceMatch {
    One(String),
    Many(Vec<String>),
}

impl LogSourceMatch {
    pub fn matches(&self, log_source: &str) -> bool {
        match self {
            Self::One(s) => s == log_source,
            Self::Many(list) => list.iter().any(|s| s == log_source),
        }
    }
}

/// Fail→success sequence correlation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSpec {
    pub fail_count: u32,
    pub fail_within_sec: i64,
    pub success_within_sec: i64,
}

/// Closed vocabulary for rule severity, with a fallback for unrecognized
/// values so a typo'd severity doesn't reject the whole rule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Other(s) => s,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "info" => Self::Info,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Other(raw),
        })
    }
}

/// Raw, on-disk rule document shape. Deserialized directly from YAML;
/// [`Rule::from_doc`] validates and compiles it into a [`Rule`].
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDoc {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub why: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub log_source: LogSourceMatch,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub r#match: BTreeMap<String, String>,
    /// Any key ending in `_regex` lands here via a custom two-pass parse
    /// (see [`loader`]); kept separate from `match` because the value is a
    /// pattern, not a literal.
    #[serde(default)]
    pub regex: BTreeMap<String, String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub window_sec: Option<i64>,
    #[serde(default)]
    pub threshold: Option<i64>,
    #[serde(default)]
    pub distinct_on: Option<Vec<String>>,
    #[serde(default)]
    pub sequence: Option<SequenceSpec>,
    #[serde(default)]
    pub cooldown_sec: i64,
    pub dedup_key: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A rule's compiled, validated form. Either a window rule, a distinct-count
/// rule, or a sequence rule — never more than one shape at once (spec
/// invariant: "a rule is either a window rule or a sequence rule, never
/// both").
#[derive(Debug, Clone)]
pub enum RuleKind {
    Window { window_sec: i64, threshold: i64, distinct_on: Option<Vec<String>> },
    Sequence(SequenceSpec),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub title: String,
    pub desc: String,
    pub why: String,
    pub advice: String,
    pub enabled: bool,
    pub log_source: LogSourceMatch,
    pub require: Vec<String>,
    pub r#match: BTreeMap<String, String>,
    /// Compiled regex predicates, field name -> pattern.
    pub regex: BTreeMap<String, Regex>,
    pub group_by: Vec<String>,
    pub kind: RuleKind,
    pub cooldown_sec: i64,
    pub dedup_key: String,
    pub severity: Severity,
    pub tags: Vec<String>,
}

impl Rule {
    /// Validate and compile a raw document into a [`Rule`]. Mirrors the
    /// spec's load-time invariants (`threshold >= 1`, `window_sec > 0`,
    /// `cooldown_sec >= 0`, window-xor-sequence) as explicit rejections
    /// rather than `panic`/`unwrap`.
    pub fn from_doc(doc: RuleDoc) -> Result<Self, String> {
        if doc.id.trim().is_empty() {
            return Err("rule id must not be empty".to_owned());
        }
        if doc.cooldown_sec < 0 {
            return Err(format!("rule {}: cooldown_sec must be >= 0", doc.id));
        }

        let kind = match (&doc.sequence, doc.window_sec, doc.threshold) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(format!(
                    "rule {}: a rule must not declare both `sequence` and window fields",
                    doc.id
                ));
            }
            (Some(seq), None, None) => {
                if seq.fail_count < 1 {
                    return Err(format!("rule {}: sequence.fail_count must be >= 1", doc.id));
                }
                if seq.fail_within_sec <= 0 || seq.success_within_sec <= 0 {
                    return Err(format!(
                        "rule {}: sequence.fail_within_sec and success_within_sec must be > 0",
                        doc.id
                    ));
                }
                RuleKind::Sequence(seq.clone())
            }
            (None, Some(window_sec), Some(threshold)) => {
                if window_sec <= 0 {
                    return Err(format!("rule {}: window_sec must be > 0", doc.id));
                }
                if threshold < 1 {
                    return Err(format!("rule {}: threshold must be >= 1", doc.id));
                }
                RuleKind::Window { window_sec, threshold, distinct_on: doc.distinct_on.clone() }
            }
            _ => {
                return Err(format!(
                    "rule {}: must declare either `sequence` or both `window_sec` and `threshold`",
                    doc.id
                ));
            }
        };

        let mut regex = BTreeMap::new();
        for (field, pattern) in &doc.regex {
            let compiled = Regex::new(pattern)
                .map_err(|e| format!("rule {}: invalid regex for {field}: {e}", doc.id))?;
            regex.insert(field.clone(), compiled);
        }

        Ok(Rule {
            name: doc.name.clone().unwrap_or_else(|| doc.id.clone()),
            title: doc.title.unwrap_or_default(),
            desc: doc.desc.unwrap_or_default(),
            why: doc.why.unwrap_or_default(),
            advice: doc.advice.unwrap_or_default(),
            id: doc.id,
            enabled: doc.enabled,
            log_source: doc.log_source,
            require: doc.require,
            r#match: doc.r#match,
            regex,
            group_by: doc.group_by,
            kind,
            cooldown_sec: doc.cooldown_sec,
            dedup_key: doc.dedup_key,
            severity: doc.severity,
            tags: doc.tags,
        })
    }
}

/// Deterministic, immutable snapshot of the rule set (sorted by id).
///
/// Kept behind an `Arc` so evaluations in flight can hold a reference across
/// a concurrent [`loader::RuleLoader::reload`] (spec §4.1: "evaluations in
/// flight complete against either the old or new snapshot but never a mix").
#[derive(Debug, Default)]
pub struct RuleCatalog {
    rules: BTreeMap<String, Rule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules: rules.into_iter().map(|r| (r.id.clone(), r)).collect() }
    }

    /// Iterate rules in catalog (id) order, skipping disabled ones.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().filter(|r| r.enabled)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }
}

pub type SharedCatalog = Arc<RuleCatalog>;

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
