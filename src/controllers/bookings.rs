use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::ApiResponse;
use crate::error::AppResult;
use crate::models::{BookingId, NewBooking, RoutePointId, TripId, UserId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
        .route("/bookings/user/{rider_id}", get(rider_bookings))
        .route("/bookings/reference/{reference}", get(booking_by_reference))
}

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    rider_id: UserId,
    trip_id: TripId,
    boarding_point_id: RoutePointId,
    drop_point_id: RoutePointId,
    #[validate(length(min = 1, max = 10))]
    seat_numbers: Vec<String>,
    #[validate(length(max = 500))]
    passenger_names: Option<String>,
    #[validate(length(max = 500))]
    passenger_contacts: Option<String>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let (_, view) = state
        .bookings
        .book(NewBooking {
            rider_id: req.rider_id,
            trip_id: req.trip_id,
            boarding_point_id: req.boarding_point_id,
            drop_point_id: req.drop_point_id,
            seat_labels: req.seat_numbers,
            passenger_names: req.passenger_names,
            passenger_contacts: req.passenger_contacts,
        })
        .await?;
    Ok(ApiResponse::created("Booking created successfully", view))
}

// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BookingId>,
) -> AppResult<impl IntoResponse> {
    let booking = state.bookings.cancel_booking(id).await?;
    Ok(ApiResponse::ok("Booking cancelled successfully", booking))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BookingId>,
) -> AppResult<impl IntoResponse> {
    let booking = state.bookings.booking(id).await?;
    let view = state.bookings.describe(&booking).await?;
    Ok(ApiResponse::ok("Booking retrieved successfully", view))
}

async fn rider_bookings(
    State(state): State<Arc<AppState>>,
    Path(rider_id): Path<UserId>,
) -> AppResult<impl IntoResponse> {
    let bookings = state.bookings.bookings_for_rider(rider_id).await?;
    Ok(ApiResponse::ok("Bookings retrieved successfully", bookings))
}

async fn booking_by_reference(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> AppResult<impl IntoResponse> {
    let booking = state.bookings.booking_by_reference(&reference).await?;
    let view = state.bookings.describe(&booking).await?;
    Ok(ApiResponse::ok("Booking retrieved successfully", view))
}
