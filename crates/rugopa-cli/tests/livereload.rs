// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the live-reload WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rugopa::livereload::{ClientRegistry, CONNECTED, RELOAD};
use rugopa_cli::server::livereload::livereload_router;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start(registry: Arc<ClientRegistry>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, livereload_router(registry)).await.unwrap();
    });
    format!("ws://{}", addr)
}

async fn wait_for_clients(registry: &ClientRegistry, count: usize) {
    for _ in 0..100 {
        if registry.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} client(s), have {}", count, registry.len());
}

async fn next_text<S>(stream: &mut S) -> String
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let message = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("websocket error");
    match message {
        Message::Text(text) => text,
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn test_connected_then_reload() {
    let registry = Arc::new(ClientRegistry::new(Duration::from_millis(20)));
    let base = start(registry.clone()).await;

    let (mut socket, _) = connect_async(format!("{}/__livereload", base)).await.unwrap();
    assert_eq!(next_text(&mut socket).await, CONNECTED);

    wait_for_clients(&registry, 1).await;
    assert_eq!(registry.broadcast(RELOAD), 1);
    assert_eq!(next_text(&mut socket).await, RELOAD);
}

#[tokio::test]
async fn test_burst_collapses_to_one_reload() {
    let registry = Arc::new(ClientRegistry::new(Duration::from_millis(50)));
    let base = start(registry.clone()).await;

    let (mut socket, _) = connect_async(base).await.unwrap();
    assert_eq!(next_text(&mut socket).await, CONNECTED);
    wait_for_clients(&registry, 1).await;

    for _ in 0..5 {
        registry.broadcast(RELOAD);
    }
    assert_eq!(next_text(&mut socket).await, RELOAD);

    let extra = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(extra.is_err(), "only one reload expected");
}

#[tokio::test]
async fn test_closed_client_is_removed() {
    let registry = Arc::new(ClientRegistry::new(Duration::from_millis(20)));
    let base = start(registry.clone()).await;

    let (mut first, _) = connect_async(base.clone()).await.unwrap();
    let (mut second, _) = connect_async(base).await.unwrap();
    assert_eq!(next_text(&mut first).await, CONNECTED);
    assert_eq!(next_text(&mut second).await, CONNECTED);
    wait_for_clients(&registry, 2).await;

    first.close(None).await.unwrap();
    wait_for_clients(&registry, 1).await;

    assert_eq!(registry.broadcast(RELOAD), 1);
    assert_eq!(next_text(&mut second).await, RELOAD);
    let _ = second.send(Message::Close(None)).await;
}
