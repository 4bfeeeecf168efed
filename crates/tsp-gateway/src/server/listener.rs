//! Gateway listener
//!
//! Serves three routes:
//! - `GET /socket` upgrades to a WebSocket and runs one session over it
//! - `GET /healthcheck` reports gateway status as JSON
//! - `GET /server` tells clients where to connect, as JSON or, with
//!   `?callback=name`, as JSONP

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use tsp_core::message::GatewayStatus;

use crate::server::websocket::WebSocketChannel;
use crate::session::SessionBridge;
use crate::state::GatewayState;

/// Gateway server that accepts client connections
#[derive(Clone)]
pub struct GatewayServer {
    /// Shared gateway state
    state: Arc<GatewayState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl GatewayServer {
    /// Create a new gateway server
    pub fn new(state: Arc<GatewayState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/socket", get(socket_handler))
            .route("/healthcheck", get(healthcheck_handler))
            .route("/server", get(server_handler))
            .with_state(self.clone())
    }

    /// Bind and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Gateway listening on {}", local_addr);

        let cancel = self.cancel.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("Gateway shutting down");
        })
        .await
        .context("Gateway server failed")?;

        Ok(())
    }

    /// Run one session over an upgraded socket
    async fn handle_socket(self, socket: WebSocket, peer_addr: SocketAddr) {
        let ticket = self.state.open_session();
        let session_id = ticket.id();
        let span = tracing::info_span!("session", id = %session_id, peer = %peer_addr);

        async move {
            tracing::info!("New client connection");

            let bridge = SessionBridge::new(
                session_id,
                WebSocketChannel::new(socket),
                Arc::clone(&self.state.config),
                self.cancel.child_token(),
            );

            // The bridge has already told the client and logged the failure
            if let Err(e) = bridge.run().await {
                tracing::debug!("Session error: {}", e);
            }

            drop(ticket);
        }
        .instrument(span)
        .await
    }
}

async fn socket_handler(
    State(server): State<GatewayServer>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| server.handle_socket(socket, peer_addr))
}

async fn healthcheck_handler(State(server): State<GatewayServer>) -> Json<GatewayStatus> {
    Json(server.state.status())
}

async fn server_handler(
    State(server): State<GatewayServer>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let info = server.state.config.server_info();

    let Some(callback) = params.get("callback").filter(|cb| !cb.is_empty()) else {
        return Json(info).into_response();
    };

    if !is_valid_callback(callback) {
        return (StatusCode::BAD_REQUEST, "Invalid callback").into_response();
    }

    match serde_json::to_string(&info) {
        Ok(json) => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{}({})", callback, json),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to serialize server info: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// JavaScript identifier path such as `cb` or `app.onServer`
fn is_valid_callback(callback: &str) -> bool {
    callback.len() <= 128
        && callback.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}
