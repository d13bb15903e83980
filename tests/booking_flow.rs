mod common;

use chrono::Duration;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use carpool_system::error::AppError;
use carpool_system::models::{BookingStatus, DriverId, RoutePointId, TripId, TripStatus, UserId};
use carpool_system::services::TripSearch;

#[tokio::test]
async fn new_trip_starts_with_all_passenger_seats_free() {
    let f = fixture().await;

    assert_eq!(f.trip.status, TripStatus::Scheduled);
    assert_eq!(f.trip.total_seats, 4);
    assert_eq!(f.trip.available_seats, 3);
    assert_eq!(f.trip.booked_seats, 0);
    assert_eq!(f.trip.estimated_arrival_time, departure() + Duration::minutes(180));

    let seats = f.state.trips.seat_availability(f.trip.id).await.unwrap();
    assert_eq!(seats.total_seats, 3);
    assert_eq!(seats.available_seats, 3);
    assert_eq!(seats.seats.len(), 4);
    assert!(seats.seats.iter().any(|s| s.is_driver_seat && s.label == "D1" && !s.is_available));
}

#[tokio::test]
async fn booking_two_seats_prices_the_segment() {
    let f = fixture().await;

    let booking = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S2"]))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.distance_km, dec!(50));
    assert_eq!(booking.total_amount, dec!(1000.00));
    assert_eq!(booking.seat_labels, seats(&["S1", "S2"]));
    assert_eq!(booking.boarding_point_name, "Pune - Station");
    assert_eq!(booking.drop_point_name, "Lonavala - Station");
    assert!(booking.reference.starts_with("BK"));

    let trip = f.state.trips.trip(f.trip.id).await.unwrap();
    assert_eq!(trip.available_seats, 1);
    assert_eq!(trip.booked_seats, 2);
    assert!(f.state.trips.audit(f.trip.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancel_restores_seats_and_counters() {
    let f = fixture().await;
    let booking = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S3"]))
        .await
        .unwrap();

    let cancelled = f.state.bookings.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let trip = f.state.trips.trip(f.trip.id).await.unwrap();
    assert_eq!(trip.available_seats, 3);
    assert_eq!(trip.booked_seats, 0);
    let seats = f.state.trips.seat_availability(f.trip.id).await.unwrap();
    assert!(seats.seats.iter().filter(|s| !s.is_driver_seat).all(|s| s.is_available));
    assert!(f.state.trips.audit(f.trip.id).await.unwrap().is_empty());

    // Freed seats can be booked again.
    f.state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S3"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn second_cancel_is_rejected_without_side_effects() {
    let f = fixture().await;
    let booking = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S2"]))
        .await
        .unwrap();
    f.state.bookings.cancel_booking(booking.id).await.unwrap();
    f.state
        .bookings
        .create_booking(booking_request(&f.trip, &["S2"]))
        .await
        .unwrap();

    let err = f.state.bookings.cancel_booking(booking.id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    let trip = f.state.trips.trip(f.trip.id).await.unwrap();
    assert_eq!(trip.available_seats, 2);
    assert_eq!(trip.booked_seats, 1);
    assert!(f.state.trips.audit(f.trip.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlapping_request_conflicts_and_changes_nothing() {
    let f = fixture().await;
    f.state
        .bookings
        .create_booking(booking_request(&f.trip, &["S2"]))
        .await
        .unwrap();

    let err = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S2"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    let seats = f.state.trips.seat_availability(f.trip.id).await.unwrap();
    assert_eq!(seats.available_seats, 2);
    assert!(seats.seats.iter().any(|s| s.label == "S1" && s.is_available));
}

#[tokio::test]
async fn driver_and_unknown_seats_conflict() {
    let f = fixture().await;

    for labels in [&["D1"][..], &["S4"][..]] {
        let err = f
            .state
            .bookings
            .create_booking(booking_request(&f.trip, labels))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{:?}", labels);
    }
    assert_eq!(f.state.trips.trip(f.trip.id).await.unwrap().available_seats, 3);
}

#[tokio::test]
async fn more_seats_than_available_is_insufficient() {
    let f = fixture().await;
    f.state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S2"]))
        .await
        .unwrap();

    let err = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1", "S3"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Insufficient(_)));
}

#[tokio::test]
async fn bad_inputs_map_to_their_error_kinds() {
    let f = fixture().await;
    let bookings = &f.state.bookings;

    let mut request = booking_request(&f.trip, &["S1", "S1"]);
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::InvalidRequest(_))));

    request = booking_request(&f.trip, &["S1"]);
    request.rider_id = UserId(999);
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::NotFound(_))));

    request = booking_request(&f.trip, &["S1"]);
    request.trip_id = TripId(999);
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::NotFound(_))));

    request = booking_request(&f.trip, &["S1"]);
    request.drop_point_id = RoutePointId(999);
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::NotFound(_))));

    // Known stop, but on another route.
    add_second_route(&f.directory);
    request = booking_request(&f.trip, &["S1"]);
    request.drop_point_id = SHIRDI;
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::NotFound(_))));

    request = booking_request(&f.trip, &["S1"]);
    request.boarding_point_id = NASHIK;
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::NotFound(_))));

    request = booking_request(&f.trip, &["S1"]);
    request.boarding_point_id = MUMBAI;
    request.drop_point_id = PUNE;
    assert!(matches!(bookings.create_booking(request).await, Err(AppError::InvalidSegment(_))));

    assert!(f.state.trips.audit(f.trip.id).await.unwrap().is_empty());
    assert_eq!(f.state.trips.trip(f.trip.id).await.unwrap().available_seats, 3);
}

#[tokio::test]
async fn missing_vehicle_rejects_booking_before_seats_are_held() {
    let f = fixture().await;
    f.directory.remove_vehicle(VEHICLE);

    let err = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let trip = f.state.trips.trip(f.trip.id).await.unwrap();
    assert_eq!(trip.available_seats, 3);
    assert_eq!(trip.booked_seats, 0);
    assert_eq!(f.store.trip(f.trip.id).unwrap().available_seats, 3);
    assert!(f.state.bookings.bookings_for_rider(RIDER).await.unwrap().is_empty());

    f.directory.insert_vehicle(vehicle());
    let (booking, view) = f.state.bookings.book(booking_request(&f.trip, &["S1"])).await.unwrap();
    assert_eq!(view.booking_id, booking.id);
    assert_eq!(view.vehicle_details, "Maruti Swift (White) - MH12AB1234");
    assert!(f.state.trips.audit(f.trip.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_trip_is_not_bookable() {
    let f = fixture().await;
    let pending = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1"]))
        .await
        .unwrap();

    let trip = f.state.trips.cancel_trip(f.trip.id).await.unwrap();

    assert_eq!(trip.status, TripStatus::Cancelled);
    assert_eq!(trip.available_seats, 3);
    assert_eq!(trip.booked_seats, 0);
    let pending = f.state.bookings.booking(pending.id).await.unwrap();
    assert_eq!(pending.status, BookingStatus::Cancelled);

    let err = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert!(matches!(
        f.state.trips.complete_trip(f.trip.id).await,
        Err(AppError::InvalidState(_))
    ));
}

#[tokio::test]
async fn confirmed_bookings_block_trip_cancellation() {
    let f = fixture().await;
    let booking = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1"]))
        .await
        .unwrap();
    f.state.payments.process_payment(booking.id).await.unwrap();

    let err = f.state.trips.cancel_trip(f.trip.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = f.state.bookings.cancel_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let trip = f.state.trips.complete_trip(f.trip.id).await.unwrap();
    assert_eq!(trip.status, TripStatus::Completed);
    assert_eq!(trip.booked_seats, 1);
}

#[tokio::test]
async fn trip_creation_validates_its_inputs() {
    let f = fixture().await;
    let trips = &f.state.trips;

    assert!(matches!(
        trips.create_trip(new_trip(Decimal::ZERO)).await,
        Err(AppError::InvalidRequest(_))
    ));

    let mut request = new_trip(Decimal::TEN);
    request.driver_id = DriverId(42);
    assert!(matches!(trips.create_trip(request).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn lookups_by_reference_and_rider() {
    let f = fixture().await;
    let first = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S1"]))
        .await
        .unwrap();
    let second = f
        .state
        .bookings
        .create_booking(booking_request(&f.trip, &["S2"]))
        .await
        .unwrap();

    let found = f.state.bookings.booking_by_reference(&first.reference).await.unwrap();
    assert_eq!(found.id, first.id);
    assert!(matches!(
        f.state.bookings.booking_by_reference("BK0000").await,
        Err(AppError::NotFound(_))
    ));

    let views = f.state.bookings.bookings_for_rider(RIDER).await.unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].booking_id, second.id);
    assert_eq!(views[0].driver_name, "Ravi Kumar");
    assert_eq!(views[0].vehicle_details, "Maruti Swift (White) - MH12AB1234");
    assert_eq!(views[0].departure_time, departure());
    assert!(f.state.bookings.bookings_for_rider(OTHER_RIDER).await.unwrap().is_empty());

    let driver_trips = f.state.trips.trips_for_driver(DRIVER).await.unwrap();
    assert_eq!(driver_trips.len(), 1);
}

#[tokio::test]
async fn search_prices_the_requested_leg() {
    let f = fixture().await;

    let search = TripSearch {
        boarding_city: "lonavala".into(),
        drop_city: " Mumbai ".into(),
        travel_date: departure().date(),
        required_seats: 2,
    };
    let results = f.state.trips.search_trips(&search).await.unwrap();

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert_eq!(hit.trip_id, f.trip.id);
    assert_eq!(hit.distance_km, dec!(100));
    assert_eq!(hit.price_per_seat, dec!(1000.00));
    assert_eq!(hit.duration_minutes, 120);
    assert_eq!(hit.arrival_time, departure() + Duration::minutes(180));

    let reversed = TripSearch { boarding_city: "Mumbai".into(), drop_city: "Pune".into(), ..search.clone() };
    assert!(f.state.trips.search_trips(&reversed).await.unwrap().is_empty());

    let too_many = TripSearch { required_seats: 4, ..search.clone() };
    assert!(f.state.trips.search_trips(&too_many).await.unwrap().is_empty());

    let other_day = TripSearch { travel_date: departure().date().succ_opt().unwrap(), ..search };
    assert!(f.state.trips.search_trips(&other_day).await.unwrap().is_empty());
}
