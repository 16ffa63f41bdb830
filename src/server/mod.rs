//! HTTP bridge between the dashboard page and the monitor.
//!
//! Provides a small REST API plus a WebSocket. The page pushes activity
//! events and dialog button presses in; the monitor's surface commands
//! (show, hide, countdown, navigate) are pushed out.

pub mod routes;
pub mod state;
pub mod surface;
pub mod ws;

pub use state::AppState;
pub use surface::{WsNavigator, WsWarningSurface};

use crate::server::routes::{health, session};
use crate::server::ws::ws_handler;
use crate::surface::SurfaceError;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Outbound channel to every connected page.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Sends an update to all connected pages.
    ///
    /// Fails with [`SurfaceError::Detached`] when no page is connected.
    pub fn send(&self, update_type: &str, data: &impl Serialize) -> Result<usize, SurfaceError> {
        let json = envelope(update_type, data);
        self.tx.send(json).map_err(|_| SurfaceError::Detached)
    }
}

/// Wraps a payload as `{"type", "data", "timestamp"}`.
pub fn envelope(update_type: &str, data: &impl Serialize) -> String {
    serde_json::json!({
        "type": update_type,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
    .to_string()
}

/// Builds the bridge router.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS layer for the dashboard origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Session API
        .route("/api/session", get(session::get_session))
        .route("/api/session/start", post(session::start_session))
        .route("/api/session/extend", post(session::extend_session))
        .route("/api/session/logout", post(session::logout_session))
        .route("/api/activity", post(session::post_activity))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Serves the bridge until `shutdown` resolves.
pub async fn run_server<F>(port: u16, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP bridge listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
