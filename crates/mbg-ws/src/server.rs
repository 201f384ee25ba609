//! WebSocket server implementation
//!
//! Starts and manages the axum-based UI control channel.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use mbg_session::SessionLauncher;

use crate::Result;
use crate::handler::websocket_handler;

/// Shared WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Opens and supervises sessions; also carries the registry
    pub launcher: SessionLauncher,
}

/// Start the UI control channel server
pub async fn start_ws_server(port: u16, launcher: SessionLauncher) -> Result<()> {
    let state = Arc::new(WsState { launcher });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(cors_layer)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("UI control channel listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
