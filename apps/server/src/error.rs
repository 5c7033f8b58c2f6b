//! API error responses.
//!
//! Every handler error becomes a JSON body with a stable machine code
//! and a human message:
//!
//! ```text
//! { "error": { "code": "INSUFFICIENT_STOCK", "message": "..." } }
//! ```
//!
//! Engine errors map onto status codes here and nowhere else; handlers
//! just use `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use meridian_engine::EngineError;

/// Stable machine-readable error codes for API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    NotFound,
    InsufficientStock,
    InsufficientTender,
    ExcessCashTender,
    PaymentNotSucceeded,
    Duplicate,
    Conflict,
    GatewayUnavailable,
    Internal,
}

/// An error ready to leave the API boundary.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            // ===== Caller input =====
            EngineError::Validation(_)
            | EngineError::InvalidDiscount { .. }
            | EngineError::InvalidPromotion { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ValidationFailed)
            }
            EngineError::InsufficientTender { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InsufficientTender)
            }
            EngineError::ExcessCashTender { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ExcessCashTender)
            }

            // ===== Missing resources =====
            EngineError::ProductNotFound { .. }
            | EngineError::StockEntryNotFound { .. }
            | EngineError::TransactionNotFound { .. }
            | EngineError::PaymentRecordNotFound { .. } => {
                (StatusCode::NOT_FOUND, ErrorCode::NotFound)
            }

            // ===== State conflicts =====
            EngineError::InsufficientStock { .. } => {
                (StatusCode::CONFLICT, ErrorCode::InsufficientStock)
            }
            EngineError::InvariantViolation { .. } => (StatusCode::CONFLICT, ErrorCode::Conflict),
            EngineError::Store(store) if store.is_unique_violation() => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate)
            }

            // ===== Gateway =====
            EngineError::PaymentNotSucceeded { .. } => {
                (StatusCode::PAYMENT_REQUIRED, ErrorCode::PaymentNotSucceeded)
            }
            EngineError::Gateway(_) => (StatusCode::BAD_GATEWAY, ErrorCode::GatewayUnavailable),

            // ===== Everything else =====
            EngineError::Core(_) | EngineError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
            }
        };

        let message = if code == ErrorCode::Internal {
            // The detailed cause goes to the log, not the wire.
            error!(error = %err, "Internal error");
            "An unexpected error occurred".to_string()
        } else {
            err.to_string()
        };

        ApiError {
            status,
            code,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Money, ValidationError};

    #[test]
    fn test_insufficient_stock_maps_to_conflict() {
        let api: ApiError = EngineError::InsufficientStock {
            sku: "BEV-001".to_string(),
            requested: 5,
            available: 3,
        }
        .into();

        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code, ErrorCode::InsufficientStock);
        assert!(api.message.contains("BEV-001"));
    }

    #[test]
    fn test_validation_maps_to_unprocessable() {
        let api: ApiError = EngineError::Validation(ValidationError::EmptyCart).into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, ErrorCode::ValidationFailed);
        assert_eq!(api.message, "Cart is empty");
    }

    #[test]
    fn test_not_found_family() {
        let api: ApiError = EngineError::TransactionNotFound {
            id: "t-1".to_string(),
        }
        .into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);

        let api: ApiError = EngineError::PaymentRecordNotFound {
            transaction_id: "t-1".to_string(),
        }
        .into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_tender_errors_map_to_unprocessable() {
        let api: ApiError = EngineError::InsufficientTender {
            total: Money::from_cents(3400),
            tendered: Money::from_cents(3000),
        }
        .into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, ErrorCode::InsufficientTender);
    }

    #[test]
    fn test_payment_not_succeeded_maps_to_402() {
        let api: ApiError = EngineError::PaymentNotSucceeded {
            status: "processing".to_string(),
        }
        .into();
        assert_eq!(api.status, StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
    }
}
