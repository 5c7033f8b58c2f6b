//! # Card-Payment Gateway Client
//!
//! The external gateway holds the money-moving side of card tenders. The
//! engine only ever performs two round trips against it:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gateway Round Trips                                │
//! │                                                                         │
//! │  create_intent(amount_minor, currency, metadata)                        │
//! │  ────────────────────────────────────────────────                       │
//! │    POST {api_base}/v1/payment_intents                                   │
//! │    → { intent_id, client_secret }                                       │
//! │                                                                         │
//! │    The client_secret goes to the caller's payment UI; the engine        │
//! │    persists nothing at this point.                                      │
//! │                                                                         │
//! │  retrieve_intent(intent_id)                                             │
//! │  ──────────────────────────                                             │
//! │    GET {api_base}/v1/payment_intents/{id}                               │
//! │    → { status, amount_received_minor }                                  │
//! │                                                                         │
//! │    Only status == "succeeded" counts as paid. Every other status        │
//! │    (requires_payment_method, processing, canceled, ...) is              │
//! │    "not succeeded".                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The intent id is recoverable from the client secret: secrets are
//! `"<intent_id>_secret_<nonce>"`, so confirms only need the secret.
//!
//! Credentials and the API base URL are injected via [`GatewayConfig`] at
//! construction. Gateway failures are surfaced as [`GatewayError`] and
//! never retried here.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

// =============================================================================
// Errors
// =============================================================================

/// Card-gateway failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Could not construct the HTTP client.
    #[error("Gateway client construction failed: {0}")]
    Configuration(String),

    /// Network-level failure (DNS, TLS, timeout, connection reset).
    #[error("Gateway request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success HTTP status.
    #[error("Gateway returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// The provider answered 2xx but the body did not parse.
    #[error("Gateway response malformed: {0}")]
    MalformedResponse(String),
}

// =============================================================================
// Wire Types
// =============================================================================

/// A freshly created payment intent.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Provider-side intent id (`pi_...`).
    pub intent_id: String,

    /// Client-facing secret handed to the payment UI.
    pub client_secret: String,
}

/// The state of an intent as reported by the provider.
#[derive(Debug, Clone)]
pub struct IntentStatus {
    pub intent_id: String,

    /// Provider status string. Compared against
    /// [`meridian_core::GATEWAY_STATUS_SUCCEEDED`] verbatim.
    pub status: String,

    /// Minor units actually captured. Zero until the intent succeeds.
    pub amount_received_minor: i64,
}

/// Extracts the intent id from a client secret.
///
/// Secrets are `"<intent_id>_secret_<nonce>"`. A string without the
/// marker is passed through whole; the provider rejects unknown ids on
/// retrieval, so no separate validation happens here.
///
/// ## Example
/// ```
/// use meridian_engine::intent_id_from_client_secret;
///
/// assert_eq!(
///     intent_id_from_client_secret("pi_3ABC_secret_xyz"),
///     "pi_3ABC"
/// );
/// ```
pub fn intent_id_from_client_secret(client_secret: &str) -> &str {
    client_secret
        .split_once("_secret_")
        .map(|(id, _)| id)
        .unwrap_or(client_secret)
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The two-call contract the settlement engine consumes.
///
/// Object-safe so the HTTP implementation and test doubles swap behind
/// `Arc<dyn PaymentGateway>`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount_minor` minor units.
    ///
    /// `metadata` key/value pairs are attached to the provider-side
    /// object (the split path keys intents to their transaction id).
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<PaymentIntent, GatewayError>;

    /// Retrieves the current state of an intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError>;
}

// =============================================================================
// Configuration
// =============================================================================

/// Gateway connection settings, injected at construction.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider API base URL, without a trailing slash.
    pub api_base: String,

    /// Secret API key, sent as a bearer token.
    pub secret_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Creates a config with the default request timeout.
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        GatewayConfig {
            api_base: api_base.into(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// What the provider returns for both create and retrieve.
///
/// Only the fields the engine consumes are modeled; the provider sends
/// plenty more.
#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    #[serde(default)]
    amount_received: i64,
}

/// reqwest-backed [`PaymentGateway`] speaking the provider's
/// form-encoded REST API.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    /// Builds the client with the configured timeout.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(HttpPaymentGateway { client, config })
    }

    async fn parse_intent(response: reqwest::Response) -> Result<IntentResponse, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<IntentResponse>()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<PaymentIntent, GatewayError> {
        let url = format!("{}/v1/payment_intents", self.config.api_base);

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("payment_method_types[]".to_string(), "card".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), (*value).to_string()));
        }

        debug!(amount_minor, currency, "Creating gateway payment intent");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let intent = Self::parse_intent(response).await?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            GatewayError::MalformedResponse("intent response missing client_secret".to_string())
        })?;

        Ok(PaymentIntent {
            intent_id: intent.id,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
        let url = format!("{}/v1/payment_intents/{}", self.config.api_base, intent_id);

        debug!(intent_id, "Retrieving gateway payment intent");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let intent = Self::parse_intent(response).await?;

        Ok(IntentStatus {
            intent_id: intent.id,
            status: intent.status,
            amount_received_minor: intent.amount_received,
        })
    }
}

// =============================================================================
// Test Double
// =============================================================================

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory gateway with scripted statuses for settlement tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use meridian_core::GATEWAY_STATUS_SUCCEEDED;

    pub struct MockGateway {
        state: Mutex<MockState>,
    }

    struct MockState {
        status: String,
        intents: HashMap<String, i64>,
        sequence: u64,
        create_calls: u64,
        retrieve_calls: u64,
        fail_create: bool,
        fail_retrieve: bool,
        last_metadata: Vec<(String, String)>,
    }

    impl MockGateway {
        /// A gateway whose intents always come back succeeded for the
        /// full created amount.
        pub fn succeeding() -> Self {
            Self::with_status(GATEWAY_STATUS_SUCCEEDED)
        }

        /// A gateway whose intents come back in the given status (with
        /// zero received when not succeeded).
        pub fn with_status(status: &str) -> Self {
            MockGateway {
                state: Mutex::new(MockState {
                    status: status.to_string(),
                    intents: HashMap::new(),
                    sequence: 0,
                    create_calls: 0,
                    retrieve_calls: 0,
                    fail_create: false,
                    fail_retrieve: false,
                    last_metadata: Vec::new(),
                }),
            }
        }

        /// Makes every create_intent call fail with a transport error.
        pub fn failing_create(self) -> Self {
            self.state.lock().unwrap().fail_create = true;
            self
        }

        /// Makes every retrieve_intent call fail with a transport error.
        pub fn failing_retrieve(self) -> Self {
            self.state.lock().unwrap().fail_retrieve = true;
            self
        }

        pub fn create_calls(&self) -> u64 {
            self.state.lock().unwrap().create_calls
        }

        pub fn retrieve_calls(&self) -> u64 {
            self.state.lock().unwrap().retrieve_calls
        }

        /// The amount the given intent was created for.
        pub fn intent_amount(&self, intent_id: &str) -> Option<i64> {
            self.state.lock().unwrap().intents.get(intent_id).copied()
        }

        /// Metadata attached to the most recent create_intent call.
        pub fn last_metadata(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().last_metadata.clone()
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_intent(
            &self,
            amount_minor: i64,
            _currency: &str,
            metadata: &[(&str, &str)],
        ) -> Result<PaymentIntent, GatewayError> {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;

            if state.fail_create {
                return Err(GatewayError::Transport("mock create failure".to_string()));
            }

            state.sequence += 1;
            let intent_id = format!("pi_mock_{}", state.sequence);
            state.intents.insert(intent_id.clone(), amount_minor);
            state.last_metadata = metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            Ok(PaymentIntent {
                client_secret: format!("{intent_id}_secret_test"),
                intent_id,
            })
        }

        async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
            let mut state = self.state.lock().unwrap();
            state.retrieve_calls += 1;

            if state.fail_retrieve {
                return Err(GatewayError::Transport("mock retrieve failure".to_string()));
            }

            let amount = state.intents.get(intent_id).copied().ok_or_else(|| {
                GatewayError::Provider {
                    status: 404,
                    body: format!("no such intent: {intent_id}"),
                }
            })?;

            let received = if state.status == GATEWAY_STATUS_SUCCEEDED {
                amount
            } else {
                0
            };

            Ok(IntentStatus {
                intent_id: intent_id.to_string(),
                status: state.status.clone(),
                amount_received_minor: received,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::mock::MockGateway;
    use super::*;

    #[test]
    fn test_intent_id_extraction() {
        assert_eq!(
            intent_id_from_client_secret("pi_3ABC123_secret_xyz789"),
            "pi_3ABC123"
        );
    }

    #[test]
    fn test_intent_id_extraction_without_marker() {
        // No marker means the whole string is treated as the id; the
        // provider rejects it at retrieval if it is garbage.
        assert_eq!(intent_id_from_client_secret("pi_plain"), "pi_plain");
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::new("https://gateway.test", "sk_test_123");
        assert_eq!(config.timeout, Duration::from_secs(30));

        let config = config.with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_mock_round_trip() {
        let gateway = MockGateway::succeeding();

        let intent = gateway
            .create_intent(2500, "cad", &[("transaction_id", "txn-1")])
            .await
            .unwrap();
        assert_eq!(intent.intent_id, "pi_mock_1");
        assert!(intent.client_secret.starts_with("pi_mock_1_secret_"));
        assert_eq!(
            gateway.last_metadata(),
            vec![("transaction_id".to_string(), "txn-1".to_string())]
        );

        let status = gateway.retrieve_intent(&intent.intent_id).await.unwrap();
        assert_eq!(status.status, "succeeded");
        assert_eq!(status.amount_received_minor, 2500);
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(gateway.retrieve_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_non_succeeded_reports_zero_received() {
        let gateway = MockGateway::with_status("requires_payment_method");

        let intent = gateway.create_intent(1000, "cad", &[]).await.unwrap();
        let status = gateway.retrieve_intent(&intent.intent_id).await.unwrap();

        assert_eq!(status.status, "requires_payment_method");
        assert_eq!(status.amount_received_minor, 0);
    }

    #[tokio::test]
    async fn test_mock_unknown_intent_is_provider_error() {
        let gateway = MockGateway::succeeding();
        let err = gateway.retrieve_intent("pi_missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::Provider { status: 404, .. }));
    }
}
