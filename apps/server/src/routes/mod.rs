//! HTTP routes.
//!
//! All endpoints live under `/api`. Handlers stay thin: deserialize,
//! call the engine, let [`ApiError`](crate::error::ApiError) shape the
//! failure.

pub mod payments;
pub mod products;
pub mod transactions;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Builds the full API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/products", products::router())
        .nest("/api/stock-entries", products::entries_router())
        .nest("/api/transactions", transactions::router())
        .nest("/api/payments", payments::router())
        .with_state(state)
}

/// Liveness plus a database round trip.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.db.health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        )
    }
}
