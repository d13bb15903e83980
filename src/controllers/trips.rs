use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::ApiResponse;
use crate::error::AppResult;
use crate::models::{DriverId, NewTrip, RouteId, TripId, VehicleId};
use crate::services::TripSearch;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/search", post(search_trips))
        .route("/trips/{id}", get(get_trip))
        .route("/trips/{id}/seats", get(get_seats))
        .route("/trips/{id}/complete", patch(complete_trip))
        .route("/trips/{id}/cancel", patch(cancel_trip))
        .route("/drivers/{id}/trips", get(driver_trips))
}

// POST /api/trips
#[derive(Debug, Deserialize, Validate)]
struct CreateTripRequest {
    route_id: RouteId,
    vehicle_id: VehicleId,
    driver_id: DriverId,
    departure_time: NaiveDateTime,
    base_price_per_km: Decimal,
    #[validate(length(max = 500))]
    special_instructions: Option<String>,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTripRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let trip = state
        .trips
        .create_trip(NewTrip {
            route_id: req.route_id,
            vehicle_id: req.vehicle_id,
            driver_id: req.driver_id,
            departure_time: req.departure_time,
            base_price_per_km: req.base_price_per_km,
            special_instructions: req.special_instructions,
        })
        .await?;

    Ok(ApiResponse::created("Trip created successfully", trip))
}

// POST /api/trips/search
fn default_required_seats() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
struct SearchTripsRequest {
    #[validate(length(min = 1, max = 100))]
    boarding_city: String,
    #[validate(length(min = 1, max = 100))]
    drop_city: String,
    travel_date: NaiveDate,
    #[serde(default = "default_required_seats")]
    #[validate(range(min = 1, max = 10))]
    required_seats: u32,
}

async fn search_trips(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchTripsRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let results = state
        .trips
        .search_trips(&TripSearch {
            boarding_city: req.boarding_city,
            drop_city: req.drop_city,
            travel_date: req.travel_date,
            required_seats: req.required_seats,
        })
        .await?;

    let message = format!("Found {} trips", results.len());
    Ok(ApiResponse::ok(message, results))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TripId>,
) -> AppResult<impl IntoResponse> {
    let trip = state.trips.trip(id).await?;
    Ok(ApiResponse::ok("Trip retrieved successfully", trip))
}

// GET /api/trips/{id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TripId>,
) -> AppResult<impl IntoResponse> {
    let seats = state.trips.seat_availability(id).await?;
    Ok(ApiResponse::ok("Seat availability retrieved successfully", seats))
}

async fn complete_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TripId>,
) -> AppResult<impl IntoResponse> {
    let trip = state.trips.complete_trip(id).await?;
    Ok(ApiResponse::ok("Trip completed", trip))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TripId>,
) -> AppResult<impl IntoResponse> {
    let trip = state.trips.cancel_trip(id).await?;
    Ok(ApiResponse::ok("Trip cancelled", trip))
}

async fn driver_trips(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
) -> AppResult<impl IntoResponse> {
    let trips = state.trips.trips_for_driver(id).await?;
    Ok(ApiResponse::ok("Driver trips retrieved successfully", trips))
}
