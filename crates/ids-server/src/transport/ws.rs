// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live subscription fan-out (spec §4.6): `/ws/events` and `/ws/alerts`
//! tail their respective bus stream from the connection-time latest
//! position, emit keep-alives on idle, and signal backend status on stream
//! errors. Grounded on the teacher's `transport/ws.rs` per-connection
//! `tokio::select!` loop, with `EventBus::tail` standing in for the
//! upstream websocket the teacher bridges from.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::debug;

use ids_core::bus::ZERO_ID;
use ids_core::StreamEntry;

use crate::state::ServerState;

/// `GET /ws/events`.
pub async fn events_handler(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| tail_loop(socket, state, "events", "event"))
}

/// `GET /ws/alerts`.
pub async fn alerts_handler(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| tail_loop(socket, state, "alerts", "alert"))
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage<'a> {
    Event { data: &'a std::collections::BTreeMap<String, String> },
    Alert { data: &'a std::collections::BTreeMap<String, String> },
    Ping,
    Status { data: StatusData<'a> },
}

#[derive(Debug, Serialize)]
struct StatusData<'a> {
    backend: &'static str,
    stream: &'a str,
}

fn wire_for<'a>(kind: &str, entry: &'a StreamEntry) -> WireMessage<'a> {
    match kind {
        "alert" => WireMessage::Alert { data: &entry.fields },
        _ => WireMessage::Event { data: &entry.fields },
    }
}

/// Per-connection tail loop. No historical replay: the subscriber's cursor
/// starts at `latest_id(stream)` observed at connection time (spec §5:
/// "will not receive any entry whose id is <= latest_id(stream) at time
/// T"). Falls behind silently if evicted past the bus cap — the intended
/// back-pressure bound (spec §9).
async fn tail_loop(socket: WebSocket, state: Arc<ServerState>, stream: &'static str, kind: &'static str) {
    let mut cursor = match state.bus.latest_id(stream).await {
        Ok(id) => id,
        Err(_) => ZERO_ID.to_owned(),
    };
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                debug!(stream, "tail loop ending: shutdown");
                break;
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => continue,
                }
            }

            result = state.bus.tail(stream, &cursor, state.config.tail_block_ms, 50) => {
                match result {
                    Ok(entries) if entries.is_empty() => {
                        if send_json(&mut ws_tx, &WireMessage::Ping).await.is_err() {
                            break;
                        }
                    }
                    Ok(entries) => {
                        let mut send_failed = false;
                        for entry in &entries {
                            if send_json(&mut ws_tx, &wire_for(kind, entry)).await.is_err() {
                                send_failed = true;
                                break;
                            }
                            cursor = entry.id.clone();
                        }
                        if send_failed {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(stream, error = %e, "bus error, signalling status");
                        if send_json(&mut ws_tx, &WireMessage::Status { data: StatusData { backend: "down", stream } })
                            .await
                            .is_err()
                        {
                            break;
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

async fn send_json(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &WireMessage<'_>,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).unwrap_or_else(|_| "{}".to_owned());
    ws_tx.send(Message::Text(text.into())).await
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
