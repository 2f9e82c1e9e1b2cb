// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Storage backend selector for the state store and event bus (spec §4.2,
/// §4.5: "backed by any key/value engine" / trait-generic bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Backend {
    /// In-process, zero-dependency backend. No cross-process fan-out.
    Memory,
    /// Redis-backed: sorted sets for window state, streams for the bus.
    Redis,
}

/// Process-wide configuration (spec §6: "state-store connection string,
/// stream cap sizes, rule directory path, public-host display override,
/// enable/disable flags for the rule engine").
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "IDS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8089, env = "IDS_PORT")]
    pub port: u16,

    /// State store and event bus backend.
    #[arg(long, value_enum, default_value_t = Backend::Memory, env = "IDS_BACKEND")]
    pub backend: Backend,

    /// Redis connection string, required when `--backend redis`.
    #[arg(long, env = "IDS_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Directory scanned for declarative rule documents (spec §4.1).
    #[arg(long, default_value = "./rules", env = "IDS_RULES_DIR")]
    pub rules_dir: PathBuf,

    /// Public-facing hostname substituted for the internal host on
    /// HTTP-family alerts (spec §4.4); internal host is retained in
    /// `asset.internal_host` for provenance.
    #[arg(long, env = "IDS_PUBLIC_HOST")]
    pub public_host: Option<String>,

    /// Approximate cap on the raw-events stream (spec §4.5: "cap ≈ 5,000").
    #[arg(long, default_value_t = 5_000, env = "IDS_EVENTS_CAP")]
    pub events_cap: usize,

    /// Approximate cap on the alerts stream (spec §4.5: "cap ≈ 2,000").
    #[arg(long, default_value_t = 2_000, env = "IDS_ALERTS_CAP")]
    pub alerts_cap: usize,

    /// Wall-clock deadline for each state-store / bus call (spec §5:
    /// "default 3s").
    #[arg(long, default_value_t = 3_000, env = "IDS_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Block duration for each subscriber `tail` poll (spec §4.6: "2000ms").
    #[arg(long, default_value_t = 2_000, env = "IDS_TAIL_BLOCK_MS")]
    pub tail_block_ms: u64,

    /// Watch `rules_dir` for filesystem changes and reload the catalog
    /// automatically (operational convenience; `POST /api/v1/rules/reload`
    /// remains the primary, test-exercised entry point).
    #[arg(long, default_value_t = true, env = "IDS_WATCH_RULES")]
    pub watch_rules: bool,

    /// Enable the rule engine. Disabling it makes ingest a pure passthrough
    /// to the event stream with no detection (spec §6 config contract).
    /// There is no parallel legacy detector to fall back to (spec §9 design
    /// notes: the clean implementation omits it entirely).
    #[arg(long, default_value_t = true, env = "IDS_RULE_ENGINE_ENABLED")]
    pub rule_engine_enabled: bool,
}

impl ServerConfig {
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}
