#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use carpool_system::cache::{InMemorySeatCache, SeatCache};
use carpool_system::config::Config;
use carpool_system::directory::InMemoryDirectory;
use carpool_system::models::{
    Driver, DriverId, NewBooking, NewTrip, Rider, Route, RouteId, RoutePoint, RoutePointId,
    SeatAvailability, Trip, TripId, UserId, Vehicle, VehicleId,
};
use carpool_system::services::gateway::{ChargeReceipt, ChargeRequest, GatewayError};
use carpool_system::services::{PaymentGateway, SimulatedGateway};
use carpool_system::store::InMemoryTripStore;
use carpool_system::AppState;

pub const RIDER: UserId = UserId(10);
pub const OTHER_RIDER: UserId = UserId(11);
pub const DRIVER: DriverId = DriverId(1);
pub const VEHICLE: VehicleId = VehicleId(1);
pub const ROUTE: RouteId = RouteId(1);
pub const PUNE: RoutePointId = RoutePointId(1);
pub const LONAVALA: RoutePointId = RoutePointId(2);
pub const MUMBAI: RoutePointId = RoutePointId(3);

pub fn departure() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 11, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn stop(id: RoutePointId, seq: i32, city: &str, meters: i32, minutes: i32) -> RoutePoint {
    RoutePoint {
        id,
        route_id: ROUTE,
        city: city.to_string(),
        sub_location: "Station".to_string(),
        point_name: RoutePoint::display_name(city, "Station"),
        address: format!("{} bus stand", city),
        latitude: 18.5,
        longitude: 73.8,
        sequence_order: seq,
        distance_from_start: meters,
        time_from_start: minutes,
        is_boarding_point: true,
        is_drop_point: true,
    }
}

/// Pune (0 km) -> Lonavala (50 km) -> Mumbai (150 km), one driver with a
/// three-passenger car and two riders.
pub fn directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.insert_rider(Rider {
        id: RIDER,
        name: "Asha Rao".into(),
        email: "asha@example.com".into(),
        phone: "+91-9000000010".into(),
    });
    directory.insert_rider(Rider {
        id: OTHER_RIDER,
        name: "Vikram Shah".into(),
        email: "vikram@example.com".into(),
        phone: "+91-9000000011".into(),
    });
    directory.insert_driver(Driver {
        id: DRIVER,
        user_id: UserId(1),
        name: "Ravi Kumar".into(),
        phone: "+91-9000000001".into(),
        rating: 4.8,
    });
    directory.insert_vehicle(vehicle());
    directory.insert_route(Route {
        id: ROUTE,
        driver_id: DRIVER,
        route_name: "Pune to Mumbai Express".into(),
        total_distance: 150.0,
        estimated_duration: 180,
        is_active: true,
        points: vec![
            stop(PUNE, 1, "Pune", 0, 0),
            stop(LONAVALA, 2, "Lonavala", 50_000, 60),
            stop(MUMBAI, 3, "Mumbai", 150_000, 180),
        ],
    });
    directory
}

pub fn vehicle() -> Vehicle {
    Vehicle {
        id: VEHICLE,
        driver_id: DRIVER,
        registration_number: "MH12AB1234".into(),
        brand: "Maruti".into(),
        model: "Swift".into(),
        color: "White".into(),
        total_seats: 4,
        passenger_seats: 3,
        is_active: true,
    }
}

/// Nashik -> Shirdi, a second route of the same driver; its stops are not on `ROUTE`.
pub const NASHIK: RoutePointId = RoutePointId(51);
pub const SHIRDI: RoutePointId = RoutePointId(52);

pub fn add_second_route(directory: &InMemoryDirectory) {
    let mut nashik = stop(NASHIK, 1, "Nashik", 0, 0);
    let mut shirdi = stop(SHIRDI, 2, "Shirdi", 90_000, 120);
    nashik.route_id = RouteId(2);
    shirdi.route_id = RouteId(2);
    directory.insert_route(Route {
        id: RouteId(2),
        driver_id: DRIVER,
        route_name: "Nashik to Shirdi".into(),
        total_distance: 90.0,
        estimated_duration: 120,
        is_active: true,
        points: vec![nashik, shirdi],
    });
}

pub struct Fixture {
    pub state: Arc<AppState>,
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryTripStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: String,
    pub trip: Trip,
}

impl Fixture {
    /// A fresh `AppState` over the same directory and store, as after a
    /// process restart.
    pub async fn restart(&self) -> Arc<AppState> {
        let config = Config::from_toml_str(&self.config).unwrap();
        let state = AppState::with_parts(
            config,
            self.directory.clone(),
            self.store.clone(),
            self.gateway.clone(),
            None,
        )
        .await
        .unwrap();
        Arc::new(state)
    }
}

/// Service stack over the in-memory directory with one scheduled trip at 10/km.
pub async fn fixture() -> Fixture {
    fixture_with(Arc::new(SimulatedGateway::approving()), "").await
}

pub async fn fixture_with(gateway: Arc<dyn PaymentGateway>, config_overrides: &str) -> Fixture {
    fixture_with_cache(gateway, config_overrides, None).await
}

pub async fn fixture_with_cache(
    gateway: Arc<dyn PaymentGateway>,
    config_overrides: &str,
    cache: Option<Arc<dyn SeatCache>>,
) -> Fixture {
    let config = Config::from_toml_str(config_overrides).unwrap();
    let directory = Arc::new(directory());
    let store = Arc::new(InMemoryTripStore::new());
    let state = AppState::with_parts(config, directory.clone(), store.clone(), gateway.clone(), cache)
        .await
        .unwrap();
    let state = Arc::new(state);
    let trip = state.trips.create_trip(new_trip(Decimal::TEN)).await.unwrap();
    Fixture { state, directory, store, gateway, config: config_overrides.to_string(), trip }
}

pub fn new_trip(rate: Decimal) -> NewTrip {
    NewTrip {
        route_id: ROUTE,
        vehicle_id: VEHICLE,
        driver_id: DRIVER,
        departure_time: departure(),
        base_price_per_km: rate,
        special_instructions: Some("No smoking".into()),
    }
}

pub fn seats(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

/// Pune -> Lonavala booking request.
pub fn booking_request(trip: &Trip, labels: &[&str]) -> NewBooking {
    NewBooking {
        rider_id: RIDER,
        trip_id: trip.id,
        boarding_point_id: PUNE,
        drop_point_id: LONAVALA,
        seat_labels: seats(labels),
        passenger_names: Some("Asha Rao".into()),
        passenger_contacts: None,
    }
}

/// Approves every charge and counts how often it was asked.
#[derive(Default)]
pub struct CountingGateway {
    pub calls: AtomicUsize,
}

impl CountingGateway {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for CountingGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeReceipt {
            gateway_reference: Some(format!("cnt_{}", request.transaction_id)),
            message: "Payment successful".into(),
        })
    }
}

/// Holds every charge until `release` is notified; `entered` fires once the
/// charge has started.
#[derive(Default)]
pub struct GatedGateway {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl PaymentGateway for GatedGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ChargeReceipt { gateway_reference: None, message: "Payment successful".into() })
    }
}

/// Panics inside the charge, killing the settle task.
pub struct PanickingGateway;

#[async_trait]
impl PaymentGateway for PanickingGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        panic!("gateway blew up");
    }
}

/// In-memory seat cache whose first save parks until `release` is
/// notified; `entered` fires once that save has started.
#[derive(Default)]
pub struct GatedSeatCache {
    pub inner: InMemorySeatCache,
    pub entered: Notify,
    pub release: Notify,
    gated: AtomicBool,
}

#[async_trait]
impl SeatCache for GatedSeatCache {
    async fn get_seat_availability(&self, trip_id: TripId) -> Option<SeatAvailability> {
        self.inner.get_seat_availability(trip_id).await
    }

    async fn save_seat_availability(&self, availability: &SeatAvailability) {
        if !self.gated.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.save_seat_availability(availability).await;
    }

    async fn invalidate_seats(&self, trip_id: TripId) {
        self.inner.invalidate_seats(trip_id).await;
    }
}
