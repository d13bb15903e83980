use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::fare;
use super::ledger::Ledger;
use super::route_graph::RouteGraph;
use crate::directory::Directory;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingId, BookingStatus, BookingView, Driver, DriverId, NewBooking, RoutePoint,
    RoutePointId, Trip, UserId, Vehicle, VehicleId,
};

/// Creates and cancels bookings against the per-trip ledger.
#[derive(Clone)]
pub struct BookingEngine {
    ledger: Arc<Ledger>,
    directory: Arc<dyn Directory>,
}

impl BookingEngine {
    pub fn new(ledger: Arc<Ledger>, directory: Arc<dyn Directory>) -> Self {
        Self { ledger, directory }
    }

    /// Reserves seats on a trip for one rider and records a PENDING booking.
    pub async fn create_booking(&self, request: NewBooking) -> AppResult<Booking> {
        self.book(request).await.map(|(booking, _)| booking)
    }

    /// Same as `create_booking`, also returning the booking as presented to
    /// the rider.
    ///
    /// Every lookup, the driver and vehicle included, runs before the trip
    /// lock is taken. Under the lock every check runs before the store write,
    /// and memory only changes once the store accepted the booking, so a
    /// rejected request leaves seats and counters untouched.
    pub async fn book(&self, request: NewBooking) -> AppResult<(Booking, BookingView)> {
        let labels = distinct_seats(&request.seat_labels)?;
        let seat_count = labels.len() as u32;

        let rider = self
            .directory
            .rider(request.rider_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("rider {}", request.rider_id)))?;
        let entry = self.ledger.entry(request.trip_id)?;
        let boarding = self.point(request.boarding_point_id, "boarding point").await?;
        let drop = self.point(request.drop_point_id, "drop point").await?;
        let route = self
            .directory
            .route(entry.route_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("route {}", entry.route_id)))?;
        let (driver, vehicle) = self.crew(entry.driver_id, entry.vehicle_id).await?;

        let mut state = entry.lock().await;

        if !state.trip.is_bookable() {
            return Err(AppError::InvalidState(format!(
                "trip {} is not bookable ({:?})",
                state.trip.id, state.trip.status
            )));
        }
        if state.trip.available_seats < seat_count {
            return Err(AppError::Insufficient(format!(
                "not enough seats: requested {}, available {}",
                seat_count, state.trip.available_seats
            )));
        }
        if let Err(e) = state.seats.ensure_reservable(&labels) {
            warn!(trip_id = %state.trip.id, seats = ?labels, "Booking rejected: {}", e);
            return Err(e);
        }
        let segment = RouteGraph::new(&route).segment_between(boarding.id, drop.id)?;
        let total_amount = fare::fare(segment.distance_km, state.trip.base_price_per_km, labels.len());

        let now = Utc::now();
        let id = self.ledger.next_booking_id();
        let booking = Booking {
            id,
            reference: self.ledger.claim_reference(id),
            rider_id: rider.id,
            trip_id: state.trip.id,
            boarding_point_id: boarding.id,
            drop_point_id: drop.id,
            boarding_point_name: RoutePoint::display_name(&boarding.city, &boarding.sub_location),
            drop_point_name: RoutePoint::display_name(&drop.city, &drop.sub_location),
            seat_labels: labels,
            total_amount,
            distance_km: segment.distance_km,
            status: BookingStatus::Pending,
            passenger_names: request.passenger_names,
            passenger_contacts: request.passenger_contacts,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.ledger.store().insert_booking(&booking).await {
            self.ledger.release_reference(&booking.reference);
            error!(trip_id = %booking.trip_id, "Failed to store booking: {}", e);
            return Err(e);
        }

        state.seats.reserve(&booking.seat_labels)?;
        state.trip.available_seats -= seat_count;
        state.trip.booked_seats += seat_count;
        state.trip.updated_at = now;
        state.insert_booking(booking.clone());
        self.ledger.index_booking(id, booking.trip_id);
        self.ledger.invalidate_seats(booking.trip_id).await;
        let view = view(&booking, &state.trip, driver, vehicle);

        info!(
            booking_id = %id,
            reference = %booking.reference,
            trip_id = %booking.trip_id,
            seats = ?booking.seat_labels,
            amount = %booking.total_amount,
            "Booking created"
        );
        Ok((booking, view))
    }

    /// Cancels a PENDING booking and returns its seats to the trip.
    pub async fn cancel_booking(&self, booking_id: BookingId) -> AppResult<Booking> {
        let entry = self.ledger.entry(self.ledger.trip_of(booking_id)?)?;
        let mut state = entry.lock().await;

        let booking = state
            .booking(booking_id)
            .ok_or_else(|| AppError::not_found(format!("booking {}", booking_id)))?;
        match booking.status {
            BookingStatus::Pending => {}
            BookingStatus::Cancelled => {
                return Err(AppError::InvalidState(format!(
                    "booking {} is already cancelled",
                    booking.reference
                )))
            }
            BookingStatus::Confirmed => {
                return Err(AppError::InvalidState(format!(
                    "booking {} is paid and cannot be cancelled",
                    booking.reference
                )))
            }
        }
        let now = Utc::now();
        let cancelled = Booking { status: BookingStatus::Cancelled, updated_at: now, ..booking.clone() };
        let seat_count = cancelled.seat_count();

        self.ledger.store().cancel_booking(&cancelled).await?;

        let released = state.seats.release(&cancelled.seat_labels);
        if released != seat_count {
            warn!(booking_id = %booking_id, released, seat_count, "Released fewer seats than the booking held");
        }
        state.trip.available_seats += seat_count;
        state.trip.booked_seats = state.trip.booked_seats.saturating_sub(seat_count);
        state.trip.updated_at = now;
        state.insert_booking(cancelled.clone());
        self.ledger.invalidate_seats(cancelled.trip_id).await;

        info!(booking_id = %booking_id, reference = %cancelled.reference, "Booking cancelled");
        Ok(cancelled)
    }

    pub async fn booking(&self, booking_id: BookingId) -> AppResult<Booking> {
        let entry = self.ledger.entry(self.ledger.trip_of(booking_id)?)?;
        let state = entry.lock().await;
        state
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("booking {}", booking_id)))
    }

    pub async fn booking_by_reference(&self, reference: &str) -> AppResult<Booking> {
        let booking_id = self
            .ledger
            .booking_for_reference(reference)
            .ok_or_else(|| AppError::not_found(format!("booking {}", reference)))?;
        self.booking(booking_id).await
    }

    /// Every booking of a rider, newest first.
    pub async fn bookings_for_rider(&self, rider_id: UserId) -> AppResult<Vec<BookingView>> {
        let per_trip = join_all(self.ledger.entries().into_iter().map(|e| async move {
            let state = e.lock().await;
            state
                .bookings()
                .filter(|b| b.rider_id == rider_id)
                .cloned()
                .collect::<Vec<_>>()
        }))
        .await;

        let mut bookings: Vec<Booking> = per_trip.into_iter().flatten().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let mut views = Vec::with_capacity(bookings.len());
        for booking in &bookings {
            views.push(self.describe(booking).await?);
        }
        Ok(views)
    }

    /// Joins a booking with its trip, driver and vehicle for presentation.
    pub async fn describe(&self, booking: &Booking) -> AppResult<BookingView> {
        let trip = {
            let entry = self.ledger.entry(booking.trip_id)?;
            let state = entry.lock().await;
            state.trip.clone()
        };
        let (driver, vehicle) = self.crew(trip.driver_id, trip.vehicle_id).await?;
        Ok(view(booking, &trip, driver, vehicle))
    }

    async fn crew(&self, driver_id: DriverId, vehicle_id: VehicleId) -> AppResult<(Driver, Vehicle)> {
        let driver = self
            .directory
            .driver(driver_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        let vehicle = self
            .directory
            .vehicle(vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("vehicle {}", vehicle_id)))?;
        Ok((driver, vehicle))
    }

    async fn point(&self, id: RoutePointId, what: &str) -> AppResult<RoutePoint> {
        self.directory
            .route_point(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} {}", what, id)))
    }
}

fn view(booking: &Booking, trip: &Trip, driver: Driver, vehicle: Vehicle) -> BookingView {
    BookingView {
        booking_id: booking.id,
        booking_reference: booking.reference.clone(),
        trip_id: trip.id,
        boarding_point: booking.boarding_point_name.clone(),
        drop_point: booking.drop_point_name.clone(),
        departure_time: trip.departure_time,
        seat_numbers: booking.seat_labels.clone(),
        total_amount: booking.total_amount,
        status: booking.status,
        driver_name: driver.name,
        driver_phone: driver.phone,
        vehicle_details: vehicle.description(),
        booked_at: booking.created_at,
    }
}

/// Trims labels and rejects an empty or repeated seat list.
fn distinct_seats(requested: &[String]) -> AppResult<Vec<String>> {
    let labels: Vec<String> = requested.iter().map(|s| s.trim().to_string()).collect();
    if labels.is_empty() {
        return Err(AppError::InvalidRequest("at least one seat must be requested".into()));
    }
    if labels.iter().any(String::is_empty) {
        return Err(AppError::InvalidRequest("seat labels must not be blank".into()));
    }
    let mut seen = HashSet::new();
    if let Some(repeated) = labels.iter().find(|l| !seen.insert(l.as_str())) {
        return Err(AppError::InvalidRequest(format!("seat {} is requested more than once", repeated)));
    }
    Ok(labels)
}
