use chrono::{Duration, NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::fare;
use super::inventory::SeatInventory;
use super::ledger::Ledger;
use super::route_graph::RouteGraph;
use crate::directory::Directory;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingStatus, DriverId, NewTrip, Route, RouteId, SeatAvailability, Trip, TripId,
    TripSearchResult, TripStatus,
};

#[derive(Debug, Clone, Deserialize)]
pub struct TripSearch {
    pub boarding_city: String,
    pub drop_city: String,
    pub travel_date: NaiveDate,
    pub required_seats: u32,
}

/// Trip lifecycle and read-side queries.
#[derive(Clone)]
pub struct TripService {
    ledger: Arc<Ledger>,
    directory: Arc<dyn Directory>,
}

impl TripService {
    pub fn new(ledger: Arc<Ledger>, directory: Arc<dyn Directory>) -> Self {
        Self { ledger, directory }
    }

    /// Schedules a trip and creates its seat pool in the same step.
    pub async fn create_trip(&self, request: NewTrip) -> AppResult<Trip> {
        if request.base_price_per_km <= Decimal::ZERO {
            return Err(AppError::InvalidRequest("base price per km must be positive".into()));
        }

        let route = self
            .directory
            .route(request.route_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("route {}", request.route_id)))?;
        let vehicle = self
            .directory
            .vehicle(request.vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("vehicle {}", request.vehicle_id)))?;
        let driver = self
            .directory
            .driver(request.driver_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("driver {}", request.driver_id)))?;

        if vehicle.driver_id != driver.id {
            return Err(AppError::InvalidRequest(format!(
                "vehicle {} does not belong to driver {}",
                vehicle.id, driver.id
            )));
        }
        if vehicle.passenger_seats == 0 {
            return Err(AppError::InvalidRequest(format!(
                "vehicle {} has no passenger seats",
                vehicle.id
            )));
        }
        if !vehicle.is_active {
            return Err(AppError::InvalidState(format!("vehicle {} is not active", vehicle.id)));
        }
        if !route.is_active {
            return Err(AppError::InvalidState(format!("route {} is not active", route.id)));
        }
        route.validate()?;

        let now = Utc::now();
        let trip = Trip {
            id: self.ledger.next_trip_id(),
            route_id: route.id,
            vehicle_id: vehicle.id,
            driver_id: driver.id,
            departure_time: request.departure_time,
            estimated_arrival_time: request.departure_time
                + Duration::minutes(i64::from(route.estimated_duration)),
            base_price_per_km: request.base_price_per_km,
            total_seats: vehicle.passenger_seats + 1,
            available_seats: vehicle.passenger_seats,
            booked_seats: 0,
            status: TripStatus::Scheduled,
            special_instructions: request.special_instructions,
            created_at: now,
            updated_at: now,
        };

        let seats = SeatInventory::for_trip(vehicle.passenger_seats);
        self.ledger.store().insert_trip(&trip, seats.seats()).await?;
        self.ledger.insert_trip(trip.clone(), seats);
        info!(
            trip_id = %trip.id,
            route_id = %trip.route_id,
            seats = vehicle.passenger_seats,
            "Trip scheduled"
        );
        Ok(trip)
    }

    pub async fn trip(&self, trip_id: TripId) -> AppResult<Trip> {
        let entry = self.ledger.entry(trip_id)?;
        let state = entry.lock().await;
        Ok(state.trip.clone())
    }

    /// Trips of a driver, latest departure first.
    pub async fn trips_for_driver(&self, driver_id: DriverId) -> AppResult<Vec<Trip>> {
        self.directory
            .driver(driver_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;

        let entries: Vec<_> = self
            .ledger
            .entries()
            .into_iter()
            .filter(|e| e.driver_id == driver_id)
            .collect();
        let mut trips = join_all(entries.iter().map(|e| async move { e.lock().await.trip.clone() })).await;

        trips.sort_by(|a, b| b.departure_time.cmp(&a.departure_time));
        Ok(trips)
    }

    /// Full seat pool of a trip. Counts cover passenger seats only; the
    /// driver seat is listed with its flag set. Served from the seat cache
    /// when one is configured.
    pub async fn seat_availability(&self, trip_id: TripId) -> AppResult<SeatAvailability> {
        if let Some(cached) = self.ledger.cached_seats(trip_id).await {
            return Ok(cached);
        }

        let entry = self.ledger.entry(trip_id)?;
        let state = entry.lock().await;
        let availability = SeatAvailability {
            trip_id,
            total_seats: state.seats.passenger_count(),
            available_seats: state.trip.available_seats,
            seats: state.seats.seats().to_vec(),
        };
        self.ledger.cache_seats(&availability).await;
        Ok(availability)
    }

    /// Scheduled trips on `travel_date` that serve the requested leg with
    /// enough free seats, earliest departure first.
    pub async fn search_trips(&self, search: &TripSearch) -> AppResult<Vec<TripSearchResult>> {
        let required = search.required_seats.max(1);

        let snapshots = join_all(self.ledger.entries().into_iter().map(|e| async move {
            let state = e.lock().await;
            state.trip.clone()
        }))
        .await;
        let candidates = snapshots.into_iter().filter(|t| {
            t.is_bookable()
                && t.departure_time.date() == search.travel_date
                && t.available_seats >= required
        });

        let mut routes: HashMap<RouteId, Option<Route>> = HashMap::new();
        let mut results = Vec::new();

        for trip in candidates {
            if !routes.contains_key(&trip.route_id) {
                let route = self.directory.route(trip.route_id).await?;
                routes.insert(trip.route_id, route);
            }
            let Some(route) = routes.get(&trip.route_id).and_then(Option::as_ref) else {
                warn!(trip_id = %trip.id, route_id = %trip.route_id, "Trip references a missing route");
                continue;
            };

            // Routes that do not serve the leg in this direction are simply not matches.
            let Ok(segment) = RouteGraph::new(route).segment(&search.boarding_city, &search.drop_city)
            else {
                continue;
            };

            let driver = self.directory.driver(trip.driver_id).await?;
            let vehicle = self.directory.vehicle(trip.vehicle_id).await?;
            let (Some(driver), Some(vehicle)) = (driver, vehicle) else {
                warn!(trip_id = %trip.id, "Trip references a missing driver or vehicle");
                continue;
            };

            results.push(TripSearchResult {
                trip_id: trip.id,
                route_name: route.route_name.clone(),
                driver_name: driver.name,
                driver_phone: driver.phone,
                driver_rating: driver.rating,
                vehicle: vehicle.description(),
                departure_time: trip.departure_time,
                arrival_time: trip.departure_time
                    + Duration::minutes(i64::from(segment.drop.time_from_start)),
                available_seats: trip.available_seats,
                price_per_km: trip.base_price_per_km,
                price_per_seat: fare::seat_price(segment.distance_km, trip.base_price_per_km),
                distance_km: segment.distance_km,
                duration_minutes: segment.duration_minutes,
            });
        }

        results.sort_by(|a, b| a.departure_time.cmp(&b.departure_time));
        Ok(results)
    }

    /// SCHEDULED -> COMPLETED. Seats and bookings are left as they are.
    pub async fn complete_trip(&self, trip_id: TripId) -> AppResult<Trip> {
        let entry = self.ledger.entry(trip_id)?;
        let mut state = entry.lock().await;

        if state.trip.status != TripStatus::Scheduled {
            return Err(AppError::InvalidState(format!(
                "trip {} is {:?} and cannot be completed",
                trip_id, state.trip.status
            )));
        }

        let mut trip = state.trip.clone();
        trip.status = TripStatus::Completed;
        trip.updated_at = Utc::now();
        self.ledger.store().update_trip_status(&trip).await?;

        state.trip = trip.clone();
        self.ledger.invalidate_seats(trip_id).await;
        info!(trip_id = %trip_id, "Trip completed");
        Ok(trip)
    }

    /// SCHEDULED -> CANCELLED, cancelling every pending booking and releasing
    /// its seats. Refused while any booking is confirmed.
    pub async fn cancel_trip(&self, trip_id: TripId) -> AppResult<Trip> {
        let entry = self.ledger.entry(trip_id)?;
        let mut state = entry.lock().await;

        if state.trip.status != TripStatus::Scheduled {
            return Err(AppError::InvalidState(format!(
                "trip {} is {:?} and cannot be cancelled",
                trip_id, state.trip.status
            )));
        }
        if let Some(confirmed) = state.bookings().find(|b| b.status == BookingStatus::Confirmed) {
            return Err(AppError::InvalidState(format!(
                "trip {} has confirmed booking {}",
                trip_id, confirmed.reference
            )));
        }

        let now = Utc::now();
        let cancelled: Vec<Booking> = state
            .bookings()
            .filter(|b| b.status == BookingStatus::Pending)
            .map(|b| Booking { status: BookingStatus::Cancelled, updated_at: now, ..b.clone() })
            .collect();
        let trip = Trip {
            available_seats: state.seats.passenger_count(),
            booked_seats: 0,
            status: TripStatus::Cancelled,
            updated_at: now,
            ..state.trip.clone()
        };
        self.ledger.store().cancel_trip(&trip, &cancelled).await?;

        for booking in &cancelled {
            state.seats.release(&booking.seat_labels);
        }
        let cancelled_bookings = cancelled.len();
        for booking in cancelled {
            state.insert_booking(booking);
        }
        state.trip = trip.clone();
        self.ledger.invalidate_seats(trip_id).await;

        info!(trip_id = %trip_id, cancelled_bookings, "Trip cancelled");
        Ok(trip)
    }

    /// Violated cross-entity invariants of a trip; empty when consistent.
    pub async fn audit(&self, trip_id: TripId) -> AppResult<Vec<String>> {
        let entry = self.ledger.entry(trip_id)?;
        let state = entry.lock().await;
        Ok(state.audit())
    }
}
