//! Tender endpoints.
//!
//! ```text
//! POST  /api/payments/cash             settle a cash sale
//! POST  /api/payments/card/intent      price the cart, open an intent
//! POST  /api/payments/card/confirm     commit the sale once the intent succeeded
//! POST  /api/payments/split            cash leg now, intent for the rest
//! POST  /api/payments/split/confirm    settle the card leg of a split
//! ```
//!
//! The request and response bodies are the engine's own settlement
//! types; this module adds nothing on top.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::state::AppState;
use meridian_engine::{
    CardConfirmRequest, CardIntent, CardIntentRequest, CashPaymentRequest, CashReceipt,
    SettlementOutcome, SplitConfirmRequest, SplitInitiation, SplitPaymentRequest,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cash", post(pay_cash))
        .route("/card/intent", post(create_card_intent))
        .route("/card/confirm", post(confirm_card))
        .route("/split", post(pay_split))
        .route("/split/confirm", post(confirm_split))
}

async fn pay_cash(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CashPaymentRequest>,
) -> Result<Json<CashReceipt>, ApiError> {
    Ok(Json(state.settlement.pay_cash(request).await?))
}

async fn create_card_intent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CardIntentRequest>,
) -> Result<Json<CardIntent>, ApiError> {
    Ok(Json(state.settlement.create_card_intent(request).await?))
}

async fn confirm_card(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CardConfirmRequest>,
) -> Result<Json<SettlementOutcome>, ApiError> {
    Ok(Json(state.settlement.confirm_card(request).await?))
}

async fn pay_split(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SplitPaymentRequest>,
) -> Result<Json<SplitInitiation>, ApiError> {
    Ok(Json(state.settlement.pay_split(request).await?))
}

async fn confirm_split(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SplitConfirmRequest>,
) -> Result<Json<SettlementOutcome>, ApiError> {
    Ok(Json(state.settlement.confirm_split(request).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use meridian_core::{CartLine, Money, Product};
    use meridian_db::Database;
    use meridian_engine::{GatewayError, IntentStatus, PaymentGateway, PaymentIntent};

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

        async fn retrieve_intent(&self, _intent_id: &str) -> Result<IntentStatus, GatewayError> {
            Err(GatewayError::Transport("stub".to_string()))
        }
    }

    async fn state_with_product() -> (Arc<AppState>, Product) {
        let db = Arc::new(Database::in_memory().await.unwrap());

        let mut product = Product::new("BEV-001", "Drip coffee", Money::from_cents(300));
        product.stock = 10;
        let mut tx = db.pool().begin().await.unwrap();
        db.products().insert(&mut tx, &product).await.unwrap();
        tx.commit().await.unwrap();

        let state = Arc::new(AppState::new(db, Arc::new(StubGateway), "cad".to_string()));
        (state, product)
    }

    fn cash_body(product: &Product, quantity: i64, tendered: i64) -> CashPaymentRequest {
        CashPaymentRequest {
            items: vec![CartLine {
                product_id: product.id.clone(),
                quantity,
            }],
            tendered_cash_cents: tendered,
            customer_id: None,
            discount_code: None,
            promotion_name: None,
            cashier: None,
        }
    }

    #[tokio::test]
    async fn test_pay_cash_handler_round_trip() {
        let (state, product) = state_with_product().await;

        let Json(receipt) = pay_cash(State(state), Json(cash_body(&product, 2, 1000)))
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 600);
        assert_eq!(receipt.balance_cents, 400);
    }

    #[tokio::test]
    async fn test_pay_cash_insufficient_tender_maps_to_422() {
        let (state, product) = state_with_product().await;

        let err = pay_cash(State(state), Json(cash_body(&product, 2, 500)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_gateway_outage_maps_to_bad_gateway() {
        let (state, product) = state_with_product().await;

        let err = create_card_intent(
            State(state),
            Json(CardIntentRequest {
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                discount_code: None,
                promotion_name: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
