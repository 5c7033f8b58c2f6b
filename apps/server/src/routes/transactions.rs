//! Transaction read and void endpoints.
//!
//! ```text
//! GET   /api/transactions          recent transactions, newest first
//! GET   /api/transactions/{id}     header, items, payment
//! POST  /api/transactions/{id}/void   restore stock, flip to voided
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use meridian_core::Transaction;
use meridian_engine::TransactionDetail;

const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// Optional body for `POST /api/transactions/{id}/void`.
#[derive(Debug, Default, Deserialize)]
pub struct VoidRequest {
    #[serde(default)]
    pub actor: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_transactions))
        .route("/{id}", get(get_transaction))
        .route("/{id}/void", post(void_transaction))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let transactions = state
        .builder
        .list_transactions(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(transactions))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TransactionDetail>, ApiError> {
    Ok(Json(state.builder.get_transaction(&id).await?))
}

async fn void_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<VoidRequest>>,
) -> Result<Json<Transaction>, ApiError> {
    let actor = body.map(|Json(b)| b.actor).unwrap_or_default();
    Ok(Json(state.builder.void_transaction(&id, actor).await?))
}
