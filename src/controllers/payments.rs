use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiResponse;
use crate::error::AppResult;
use crate::models::{BookingId, PaymentStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/process", post(process_payment))
        .route("/payments/booking/{id}", get(payment_for_booking))
        .route("/payments/transaction/{transaction_id}", get(payment_by_transaction))
}

#[derive(Debug, Deserialize)]
struct ProcessPaymentRequest {
    booking_id: BookingId,
}

// POST /api/payments/process: 200 when the charge went through, 402 when it did not.
async fn process_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessPaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let payment = state.payments.process_payment(req.booking_id).await?;

    let (status, message) = match payment.status {
        PaymentStatus::Success => (StatusCode::OK, "Payment successful".to_string()),
        _ => (
            StatusCode::PAYMENT_REQUIRED,
            format!(
                "Payment failed: {}",
                payment.failure_reason.as_deref().unwrap_or("unknown reason")
            ),
        ),
    };
    Ok((status, ApiResponse::ok(message, payment)))
}

async fn payment_for_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BookingId>,
) -> AppResult<impl IntoResponse> {
    let payment = state.payments.payment_for_booking(id).await?;
    Ok(ApiResponse::ok("Payment retrieved successfully", payment))
}

async fn payment_by_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let payment = state.payments.payment_by_transaction(&transaction_id).await?;
    Ok(ApiResponse::ok("Payment retrieved successfully", payment))
}
