// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP ingest + administrative endpoints and websocket fan-out (spec §4.6,
//! §4.7, §6).

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::ServerState;

/// Build the axum `Router` with every ids-server route.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/events", post(http::ingest_event))
        .route("/api/v1/rules", get(http::list_rules))
        .route("/api/v1/rules/reload", post(http::reload_rules))
        .route("/ws/events", get(ws::events_handler))
        .route("/ws/alerts", get(ws::alerts_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
