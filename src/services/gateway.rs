//! External payment gateway.
//!
//! The coordinator only consumes the outcome of a charge. Two implementations:
//!
//! 1.  **HttpPaymentGateway**: JSON client for a merchant gateway. Requests are
//!     signed with a SHA-256 token and pass through a `CircuitBreaker` so a
//!     failing gateway is not hammered.
//! 2.  **SimulatedGateway**: waits a configured delay and approves or declines
//!     every charge. Used in development and tests.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig, PaymentMode};

/// What the coordinator asks the gateway to charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Our transaction id; doubles as the gateway order id.
    pub transaction_id: String,
    pub booking_reference: String,
    /// Major units, two decimal places.
    pub amount: Decimal,
    /// ISO 4217 code, e.g. `INR`.
    pub currency: String,
    /// Shown to the payer by the gateway.
    pub description: String,
}

/// Successful charge.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    /// Gateway-side payment id, when it returns one.
    pub gateway_reference: Option<String>,
    /// Human-readable outcome.
    pub message: String,
}

/// Why a charge did not go through.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The breaker is rejecting calls; the gateway was not contacted.
    #[error("circuit breaker is open - payment gateway temporarily unavailable")]
    CircuitOpen,
    /// Transport failure or a non-success HTTP status.
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The gateway answered and refused the charge.
    #[error("payment declined: {0}")]
    Declined(String),
    /// Negative or too large to send as an integer of minor units.
    #[error("amount {0} cannot be expressed in minor units")]
    InvalidAmount(Decimal),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Performs one blocking charge. Any error means the money did not move.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;
}

/// Builds the gateway selected by configuration.
pub fn from_config(
    payment: &PaymentConfig,
    breaker: &CircuitBreakerConfig,
) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    match payment.mode {
        PaymentMode::Simulated => Ok(Arc::new(SimulatedGateway::new(
            Duration::from_millis(payment.simulated_delay_ms),
            payment.simulated_approve,
        ))),
        PaymentMode::Http => Ok(Arc::new(HttpPaymentGateway::new(
            payment,
            CircuitBreaker::new(breaker.failure_threshold, breaker.timeout_seconds),
        )?)),
    }
}

// --- Circuit breaker ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected until the cool-down elapses.
    Open,
    /// One trial request decides between Closed and Open.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    /// When the breaker last tripped.
    opened_at: Option<Instant>,
}

/// Stops calling a gateway that keeps failing, then tries it again after a cool-down.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    /// Consecutive failures since the last success.
    failure_count: AtomicU32,
    /// Failures that trip the breaker to Open.
    failure_threshold: u32,
    /// Time spent Open before a HalfOpen trial.
    cool_down: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self::with_cool_down(failure_threshold, Duration::from_secs(timeout_seconds))
    }

    pub fn with_cool_down(failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState { circuit: CircuitState::Closed, opened_at: None }),
            failure_count: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
            cool_down,
        }
    }

    pub fn can_execute(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.circuit {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = state.opened_at.map_or(true, |at| at.elapsed() >= self.cool_down);
                if cooled {
                    state.circuit = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                }
                cooled
            }
        }
    }

    /// Closes the breaker and resets the failure count.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.circuit == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        state.circuit = CircuitState::Closed;
        state.opened_at = None;
        self.failure_count.store(0, Ordering::Relaxed);
    }

    /// Counts a failure; trips to Open at the threshold or on a failed HalfOpen trial.
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let trip = state.circuit == CircuitState::HalfOpen || failures >= self.failure_threshold;
        if trip && state.circuit != CircuitState::Open {
            warn!(failures, "Circuit breaker OPEN - payment gateway requests blocked");
            state.circuit = CircuitState::Open;
            state.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).circuit
    }
}

// --- HTTP gateway ---

#[derive(Debug, Serialize)]
struct PaymentInitRequest {
    #[serde(rename = "teamSlug")]
    team_slug: String,
    token: String,
    amount: i64,
    #[serde(rename = "orderId")]
    order_id: String,
    currency: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct PaymentInitResponse {
    success: bool,
    #[serde(rename = "paymentId")]
    payment_id: Option<String>,
    message: Option<String>,
}

/// Merchant gateway over HTTP.
pub struct HttpPaymentGateway {
    /// Merchant id sent as `teamSlug`.
    team_slug: String,
    /// Shared secret mixed into the request token; never sent on its own.
    password: String,
    /// Gateway root without a trailing slash.
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentConfig, circuit_breaker: CircuitBreaker) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            team_slug: config.merchant_id.clone(),
            password: config.merchant_password.clone(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker,
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// SHA-256 over amount, currency, order id, password and merchant id.
    fn token(&self, amount: i64, currency: &str, order_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}{}{}{}{}", amount, currency, order_id, self.password, self.team_slug));
        format!("{:x}", hasher.finalize())
    }

    async fn send_init(&self, request: &PaymentInitRequest) -> Result<PaymentInitResponse, reqwest::Error> {
        self.http_client
            .post(format!("{}/api/v1/PaymentInit/init", self.base_url))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<PaymentInitResponse>()
            .await
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        let minor_units = (request.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(GatewayError::InvalidAmount(request.amount))?;

        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(GatewayError::CircuitOpen);
        }

        let init = PaymentInitRequest {
            team_slug: self.team_slug.clone(),
            token: self.token(minor_units, &request.currency, &request.transaction_id),
            amount: minor_units,
            order_id: request.transaction_id.clone(),
            currency: request.currency.clone(),
            description: request.description.clone(),
        };

        info!(
            transaction_id = %request.transaction_id,
            amount = minor_units,
            currency = %request.currency,
            "Sending charge to payment gateway"
        );

        let response = match self.send_init(&init).await {
            Ok(response) => {
                self.circuit_breaker.record_success();
                response
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(GatewayError::Http(e));
            }
        };

        if !response.success {
            let reason = response.message.unwrap_or_else(|| "unknown gateway error".to_string());
            return Err(GatewayError::Declined(reason));
        }

        Ok(ChargeReceipt {
            gateway_reference: response.payment_id,
            message: response.message.unwrap_or_else(|| "Payment successful".to_string()),
        })
    }
}

// --- Simulated gateway ---

/// Gateway stand-in with a fixed answer.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    /// Pause before answering, to mimic network latency.
    delay: Duration,
    /// Approve every charge when true, decline every charge otherwise.
    approve: bool,
}

impl SimulatedGateway {
    pub fn new(delay: Duration, approve: bool) -> Self {
        Self { delay, approve }
    }

    pub fn approving() -> Self {
        Self::new(Duration::ZERO, true)
    }

    pub fn declining() -> Self {
        Self::new(Duration::ZERO, false)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        tokio::time::sleep(self.delay).await;
        if self.approve {
            Ok(ChargeReceipt {
                gateway_reference: Some(format!("sim_{}", request.transaction_id)),
                message: "Payment successful".to_string(),
            })
        } else {
            Err(GatewayError::Declined("Payment gateway error".to_string()))
        }
    }
}
