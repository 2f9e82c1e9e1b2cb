// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ids_core::{AlertBuilder, DetectionEngine, RuleLoader, SharedEventBus, SharedStateStore};

use crate::config::ServerConfig;

/// Shared server state, threaded through every axum handler via
/// `State<Arc<ServerState>>` (mirrors the teacher's `MuxState`).
pub struct ServerState {
    pub config: ServerConfig,
    pub loader: Arc<RuleLoader>,
    pub engine: DetectionEngine,
    pub bus: SharedEventBus,
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        loader: Arc<RuleLoader>,
        store: SharedStateStore,
        bus: SharedEventBus,
        shutdown: CancellationToken,
    ) -> Self {
        let builder = AlertBuilder::new(config.public_host.clone());
        let engine = DetectionEngine::new(Arc::clone(&loader), store, builder)
            .with_store_timeout(config.store_timeout());
        Self { config, loader, engine, bus, shutdown }
    }
}
