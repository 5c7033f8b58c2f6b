//! Product catalog and stock ledger endpoints.
//!
//! ```text
//! GET    /api/products                      list active products
//! POST   /api/products                      register a product
//! GET    /api/products/{id}                 fetch one product
//! GET    /api/products/{id}/stock-entries   movement history, newest first
//! POST   /api/stock-entries                 apply a stock movement
//! POST   /api/stock-entries/{id}/reverse    reverse a movement
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use meridian_core::{NewProduct, Product, StockEntry};

const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// Body for `POST /api/stock-entries`.
#[derive(Debug, Deserialize)]
pub struct ApplyStockEntryRequest {
    pub product_id: String,
    pub delta: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
}

/// Optional body for `POST /api/stock-entries/{id}/reverse`.
#[derive(Debug, Default, Deserialize)]
pub struct ReverseEntryRequest {
    #[serde(default)]
    pub actor: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/{id}", get(get_product))
        .route("/{id}/stock-entries", get(list_entries))
}

pub fn entries_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(apply_entry))
        .route("/{id}/reverse", post(reverse_entry))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .stock
        .list_products(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(products))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.stock.register_product(new, None).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.stock.get_product(&id).await?))
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StockEntry>>, ApiError> {
    let entries = state
        .stock
        .entries_for_product(&id, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(entries))
}

async fn apply_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApplyStockEntryRequest>,
) -> Result<(StatusCode, Json<StockEntry>), ApiError> {
    let entry = state
        .stock
        .apply_entry(
            &request.product_id,
            request.delta,
            request.note,
            request.recorded_by,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn reverse_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ReverseEntryRequest>>,
) -> Result<Json<StockEntry>, ApiError> {
    let actor = body.map(|Json(b)| b.actor).unwrap_or_default();
    Ok(Json(state.stock.reverse_entry(&id, actor).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_db::Database;
    use meridian_engine::{GatewayError, PaymentGateway, PaymentIntent};

    struct StubGateway;

    #[async_trait::async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_intent(
            &self,
            _amount_minor: i64,
            _currency: &str,
            _metadata: &[(&str, &str)],
        ) -> Result<PaymentIntent, GatewayError> {
            Err(GatewayError::Transport("stub".to_string()))
        }

        async fn retrieve_intent(
            &self,
            _intent_id: &str,
        ) -> Result<meridian_engine::IntentStatus, GatewayError> {
            Err(GatewayError::Transport("stub".to_string()))
        }
    }

    async fn test_state() -> Arc<AppState> {
        let db = Arc::new(Database::in_memory().await.unwrap());
        Arc::new(AppState::new(db, Arc::new(StubGateway), "cad".to_string()))
    }

    fn new_product(sku: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("{sku} item"),
            description: None,
            unit_price_cents: 450,
            opening_stock: 12,
            branch_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_get_product() {
        let state = test_state().await;

        let (status, Json(product)) =
            create_product(State(Arc::clone(&state)), Json(new_product("BEV-001")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(product.stock, 12);

        let Json(fetched) = get_product(State(state), Path(product.id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.sku, "BEV-001");
    }

    #[tokio::test]
    async fn test_duplicate_sku_maps_to_conflict() {
        let state = test_state().await;

        create_product(State(Arc::clone(&state)), Json(new_product("DUP-1")))
            .await
            .unwrap();
        let err = create_product(State(state), Json(new_product("DUP-1")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_apply_and_reverse_entry_handlers() {
        let state = test_state().await;
        let (_, Json(product)) =
            create_product(State(Arc::clone(&state)), Json(new_product("GRO-001")))
                .await
                .unwrap();

        let (status, Json(entry)) = apply_entry(
            State(Arc::clone(&state)),
            Json(ApplyStockEntryRequest {
                product_id: product.id.clone(),
                delta: 6,
                note: None,
                recorded_by: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(reversed) = reverse_entry(State(state), Path(entry.id.clone()), None)
            .await
            .unwrap();
        assert!(reversed.reversed);
    }
}
