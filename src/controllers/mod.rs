pub mod bookings;
pub mod payments;
pub mod trips;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Envelope shared by every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self { success: true, message: message.into(), data: Some(data) })
    }

    pub fn created(message: impl Into<String>, data: T) -> impl IntoResponse {
        (StatusCode::CREATED, Self::ok(message, data))
    }
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(trips::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
}
