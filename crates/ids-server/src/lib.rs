// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ids-server: the ingestion HTTP endpoint and websocket fan-out shell
//! around `ids_core`'s detection pipeline (spec §1: "thin transport shell
//! around the core").

pub mod config;
pub mod error;
pub mod ingest;
pub mod state;
pub mod transport;
pub mod watcher;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use ids_core::bus::memory::MemoryEventBus;
use ids_core::bus::redis_streams::RedisStreamBus;
use ids_core::store::memory::MemoryStateStore;
use ids_core::store::redis::RedisStateStore;
use ids_core::{RuleLoader, SharedEventBus, SharedStateStore};

use crate::config::{Backend, ServerConfig};
use crate::state::ServerState;
use crate::transport::build_router;

/// Run the ids-server process until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let (store, bus): (SharedStateStore, SharedEventBus) = match config.backend {
        Backend::Memory => (
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryEventBus::with_caps(config.events_cap, config.alerts_cap)),
        ),
        Backend::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--redis-url is required when --backend redis"))?;
            (
                Arc::new(RedisStateStore::new(redis_url).await?),
                Arc::new(RedisStreamBus::with_caps(redis_url, config.events_cap, config.alerts_cap).await?),
            )
        }
    };

    bus.ensure_exists("events").await?;
    bus.ensure_exists("alerts").await?;

    let (loader, load_failures) = RuleLoader::load(&config.rules_dir);
    for failure in &load_failures {
        tracing::warn!(path = %failure.path.display(), reason = %failure.reason, "rule load rejected file");
    }
    let loader = Arc::new(loader);
    tracing::info!(rules_dir = %config.rules_dir.display(), rejected = load_failures.len(), "rule catalog loaded");

    if config.watch_rules && config.rules_dir.is_dir() {
        crate::watcher::spawn(&config.rules_dir, Arc::clone(&loader), shutdown.clone());
    }

    let state = Arc::new(ServerState::new(config, loader, store, bus, shutdown.clone()));
    let router = build_router(Arc::clone(&state));

    tracing::info!("ids-server listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
