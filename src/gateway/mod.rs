//! HTTP Gateway
//!
//! Thin axum surface over the coordinator, the ledger, and the webhook
//! ingestors. All business rules live below this layer.

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/transfers", post(handlers::create_transfer))
        .route("/api/v1/transfers/{id}", get(handlers::get_transfer))
        .route("/webhooks/payout", post(handlers::payout_webhook))
        .route("/webhooks/payment", post(handlers::payment_webhook))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn run_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> Result<(), std::io::Error> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await
}
