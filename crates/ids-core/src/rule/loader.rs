// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scans a directory for rule documents and builds a [`RuleCatalog`]
//! (spec §4.1). Grounded on `toka-rule-metadata`'s YAML rule scan, adapted
//! so a malformed file rejects only itself, never the whole load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use walkdir::WalkDir;

use crate::rule::{Rule, RuleCatalog, RuleDoc, SharedCatalog};

/// Load failure for a single rule file; the loader collects these rather
/// than aborting (spec: "the loader never partially accepts a file" — a bad
/// file rejects only itself).
#[derive(Debug, Clone)]
pub struct RuleLoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a load/reload pass: the new catalog plus any per-file failures.
pub struct LoadReport {
    pub catalog: RuleCatalog,
    pub failures: Vec<RuleLoadFailure>,
}

/// Parse a single rule document from YAML text.
///
/// `*_regex`-suffixed top-level keys are lifted into `RuleDoc::regex`
/// (stripped of the suffix) via a generic-value pre-pass, since they are
/// not known field names ahead of time.
pub fn parse_rule_yaml(text: &str) -> Result<Rule, String> {
    let mut value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| format!("yaml parse error: {e}"))?;

    let mut regex_fields = BTreeMap::new();
    if let serde_yaml::Value::Mapping(ref mut map) = value {
        let keys: Vec<serde_yaml::Value> = map.keys().cloned().collect();
        for key in keys {
            if let serde_yaml::Value::String(k) = &key {
                if let Some(field) = k.strip_suffix("_regex") {
                    if let Some(v) = map.remove(&key) {
                        let pattern = v
                            .as_str()
                            .ok_or_else(|| format!("{k}: regex value must be a string"))?
                            .to_owned();
                        regex_fields.insert(field.to_owned(), pattern);
                    }
                }
            }
        }
    }

    let mut doc: RuleDoc =
        serde_yaml::from_value(value).map_err(|e| format!("schema error: {e}"))?;
    doc.regex = regex_fields;

    Rule::from_doc(doc)
}

/// Load all `.yaml`/`.yml` rule documents from `dir` (non-recursive).
pub fn load_dir(dir: &Path) -> LoadReport {
    let mut rules = Vec::new();
    let mut failures = Vec::new();
    let mut seen_ids: BTreeMap<String, PathBuf> = BTreeMap::new();

    let entries = WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok());
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext != "yaml" && ext != "yml" {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                failures.push(RuleLoadFailure { path: path.to_path_buf(), reason: e.to_string() });
                continue;
            }
        };

        match parse_rule_yaml(&text) {
            Ok(rule) => {
                if let Some(prior) = seen_ids.get(&rule.id) {
                    failures.push(RuleLoadFailure {
                        path: path.to_path_buf(),
                        reason: format!(
                            "duplicate rule id {:?}, already defined in {}",
                            rule.id,
                            prior.display()
                        ),
                    });
                    continue;
                }
                seen_ids.insert(rule.id.clone(), path.to_path_buf());
                rules.push(rule);
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "rejected rule document");
                failures.push(RuleLoadFailure { path: path.to_path_buf(), reason });
            }
        }
    }

    LoadReport { catalog: RuleCatalog::new(rules), failures }
}

/// Holds the live, atomically-swappable rule catalog.
///
/// `reload()` re-scans `dir` and swaps the snapshot; an in-flight evaluation
/// that already cloned the previous `Arc<RuleCatalog>` keeps running against
/// it (spec: never a mix of old and new).
pub struct RuleLoader {
    dir: PathBuf,
    catalog: RwLock<SharedCatalog>,
}

impl RuleLoader {
    /// Load the initial catalog from `dir`, returning the loader and any
    /// per-file load failures encountered on this first pass.
    pub fn load(dir: impl Into<PathBuf>) -> (Self, Vec<RuleLoadFailure>) {
        let dir = dir.into();
        let report = load_dir(&dir);
        (
            Self { dir, catalog: RwLock::new(Arc::new(report.catalog)) },
            report.failures,
        )
    }

    /// Current catalog snapshot, cheap to clone (`Arc`).
    pub async fn catalog(&self) -> SharedCatalog {
        self.catalog.read().await.clone()
    }

    /// Re-scan `dir` and atomically install the new catalog.
    pub async fn reload(&self) -> Vec<RuleLoadFailure> {
        let report = load_dir(&self.dir);
        *self.catalog.write().await = Arc::new(report.catalog);
        report.failures
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
