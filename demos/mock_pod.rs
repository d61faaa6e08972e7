//! A stand-in pod for trying the distributor locally.
//!
//! Serves WebSocket echo under `/cool/` and a plain greeting elsewhere on
//! 127.0.0.1:9980, the default backend port.
//!
//! ```text
//! cargo run --example mock-pod
//! POD_IP=127.0.0.1 cargo run --bin pod-agent
//! cargo run --bin session-distributor
//! ```

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let app = Router::new()
        .route("/cool/{*path}", get(echo_socket))
        .fallback(|| async { "Hello from the mock pod" });

    let addr = SocketAddr::from(([127, 0, 0, 1], 9980));
    println!("Mock pod listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn echo_socket(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(echo)
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
        if socket.send(message).await.is_err() {
            break;
        }
    }
}
