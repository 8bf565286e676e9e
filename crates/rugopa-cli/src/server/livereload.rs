// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! WebSocket server for live reload.
//!
//! Each connection is greeted with `connected`, then registered with the
//! [`ClientRegistry`]. Broadcasts reach the socket through a per-client
//! debounced channel. A failing connection only ends itself.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use rugopa::livereload::{ClientRegistry, CONNECTED};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Path the browser snippet connects to.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Builds the live-reload router. The socket is served on `/` and on
/// [`LIVERELOAD_PATH`].
pub fn livereload_router(registry: Arc<ClientRegistry>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route(LIVERELOAD_PATH, get(ws_handler))
        .with_state(registry)
}

/// Serves the live-reload router on `addr` until the task is dropped.
pub async fn serve_livereload(addr: &str, registry: Arc<ClientRegistry>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Live reload listening on ws://{}", addr);
    axum::serve(listener, livereload_router(registry)).await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(registry): State<Arc<ClientRegistry>>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, registry))
}

/// Handles one live-reload connection until either side closes it.
pub async fn handle_websocket(mut socket: WebSocket, registry: Arc<ClientRegistry>) {
    if socket.send(Message::Text(CONNECTED.to_string())).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = registry.add(tx);
    tracing::debug!("Live reload client {:?} connected ({} total)", id, registry.len());

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Live reload client {:?} errored: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    registry.remove(id);
    tracing::debug!("Live reload client {:?} disconnected", id);
}
