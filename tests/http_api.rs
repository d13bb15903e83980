mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use carpool_system::app;
use carpool_system::cache::{InMemorySeatCache, SeatCache};
use carpool_system::services::SimulatedGateway;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn booking_body(trip_id: i64, seats: &[&str]) -> Value {
    json!({
        "rider_id": RIDER.0,
        "trip_id": trip_id,
        "boarding_point_id": PUNE.0,
        "drop_point_id": LONAVALA.0,
        "seat_numbers": seats,
        "passenger_names": "Asha Rao"
    })
}

#[tokio::test]
async fn health_check() {
    let f = fixture().await;
    let response = app(f.state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let f = fixture().await;
    let app = app(f.state.clone());
    let trip_id = f.trip.id.0;

    let (status, body) = send(&app, "POST", "/api/bookings", Some(booking_body(trip_id, &["S1", "S2"]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total_amount"], "1000.00");
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["driver_name"], "Ravi Kumar");
    let booking_id = body["data"]["booking_id"].as_i64().unwrap();
    let reference = body["data"]["booking_reference"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/api/trips/{}/seats", trip_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_seats"], 1);

    let (status, body) = send(&app, "POST", "/api/bookings", Some(booking_body(trip_id, &["S2"]))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "CONFLICT");

    let (status, body) = send(&app, "GET", &format!("/api/bookings/reference/{}", reference), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["booking_id"], booking_id);

    let (status, body) = send(&app, "POST", "/api/payments/process", Some(json!({ "booking_id": booking_id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "SUCCESS");

    let (status, body) = send(&app, "POST", "/api/payments/process", Some(json!({ "booking_id": booking_id }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "CONFLICT");

    let (status, body) = send(&app, "PUT", &format!("/api/bookings/{}/cancel", booking_id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "INVALID_STATE");

    let (status, body) = send(&app, "GET", &format!("/api/bookings/user/{}", RIDER.0), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "CONFIRMED");
}

#[tokio::test]
async fn declined_payment_answers_402() {
    let f = fixture_with(Arc::new(SimulatedGateway::declining()), "").await;
    let app = app(f.state.clone());

    let (_, body) = send(&app, "POST", "/api/bookings", Some(booking_body(f.trip.id.0, &["S3"]))).await;
    let booking_id = body["data"]["booking_id"].as_i64().unwrap();

    let (status, body) = send(&app, "POST", "/api/payments/process", Some(json!({ "booking_id": booking_id }))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["data"]["status"], "FAILED");

    let (status, body) = send(&app, "GET", &format!("/api/payments/booking/{}", booking_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FAILED");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let f = fixture().await;
    let app = app(f.state.clone());

    let (status, body) = send(&app, "POST", "/api/bookings", Some(booking_body(f.trip.id.0, &[]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "VALIDATION");

    let (status, body) = send(&app, "GET", "/api/trips/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let mut reversed = booking_body(f.trip.id.0, &["S1"]);
    reversed["boarding_point_id"] = json!(MUMBAI.0);
    let (status, body) = send(&app, "POST", "/api/bookings", Some(reversed)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "INVALID_SEGMENT");
}

#[tokio::test]
async fn trips_over_http() {
    let f = fixture().await;
    let app = app(f.state.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/trips",
        Some(json!({
            "route_id": ROUTE.0,
            "vehicle_id": VEHICLE.0,
            "driver_id": DRIVER.0,
            "departure_time": "2026-11-02T07:30:00",
            "base_price_per_km": "4.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "SCHEDULED");
    assert_eq!(body["data"]["available_seats"], 3);
    let new_trip_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/trips/search",
        Some(json!({ "boarding_city": "Pune", "drop_city": "Mumbai", "travel_date": "2026-11-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["trip_id"], new_trip_id);
    assert_eq!(body["data"][0]["price_per_seat"], "675.00");

    let (status, body) = send(&app, "GET", &format!("/api/drivers/{}/trips", DRIVER.0), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["id"], new_trip_id);

    let (status, body) = send(&app, "PATCH", &format!("/api/trips/{}/complete", new_trip_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "COMPLETED");

    let (status, _) = send(&app, "PATCH", &format!("/api/trips/{}/cancel", new_trip_id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn seats_endpoint_follows_bookings_through_the_cache() {
    let cache = Arc::new(InMemorySeatCache::new());
    let f = fixture_with_cache(
        Arc::new(SimulatedGateway::approving()),
        "",
        Some(cache.clone() as Arc<dyn SeatCache>),
    )
    .await;
    let app = app(f.state.clone());
    let seats_uri = format!("/api/trips/{}/seats", f.trip.id.0);

    let (status, body) = send(&app, "GET", &seats_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_seats"], 3);
    assert!(cache.peek(f.trip.id).is_some());

    let (status, body) = send(&app, "POST", "/api/bookings", Some(booking_body(f.trip.id.0, &["S1"]))).await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = body["data"]["booking_id"].as_i64().unwrap();
    assert!(cache.peek(f.trip.id).is_none());

    let (_, body) = send(&app, "GET", &seats_uri, None).await;
    assert_eq!(body["data"]["available_seats"], 2);

    send(&app, "PUT", &format!("/api/bookings/{}/cancel", booking_id), None).await;
    let (_, body) = send(&app, "GET", &seats_uri, None).await;
    assert_eq!(body["data"]["available_seats"], 3);
}

#[tokio::test]
async fn booking_without_a_vehicle_is_not_found() {
    let f = fixture().await;
    let app = app(f.state.clone());
    f.directory.remove_vehicle(VEHICLE);

    let (status, body) = send(&app, "POST", "/api/bookings", Some(booking_body(f.trip.id.0, &["S1"]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let (_, body) = send(&app, "GET", &format!("/api/trips/{}/seats", f.trip.id.0), None).await;
    assert_eq!(body["data"]["available_seats"], 3);
}
