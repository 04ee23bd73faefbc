//! # argos-server
//!
//! The query/comparison service: an axum HTTP + WebSocket surface over
//! the store, plus the pure HTML/Markdown report renderers. Handlers are
//! thin wrappers over the storage engine and the analytics functions.

pub mod analytics;
pub mod error;
pub mod reports;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;

use std::net::SocketAddr;

use tracing::info;

/// Serve the API until the process is stopped.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "argos API listening");
    axum::serve(listener, router(state)).await
}
