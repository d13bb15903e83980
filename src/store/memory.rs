use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{StoredState, StoredTrip, TripStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingId, BookingStatus, Payment, PaymentId, PaymentStatus, Seat, Trip, TripId,
    TripStatus,
};

#[derive(Debug, Default)]
struct Tables {
    trips: BTreeMap<TripId, Trip>,
    /// Seat with the booking holding it.
    seats: BTreeMap<TripId, Vec<(Seat, Option<BookingId>)>>,
    bookings: BTreeMap<BookingId, Booking>,
    payments: BTreeMap<PaymentId, Payment>,
}

/// Store held in memory with the same guarantees as the Postgres one.
/// Survives a rebuilt `AppState`, not a process exit; used for tests and
/// embedded setups.
#[derive(Debug, Default)]
pub struct InMemoryTripStore {
    tables: Mutex<Tables>,
    /// When set, every write fails as if the database were unreachable.
    failing: AtomicBool,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.tables().bookings.get(&id).cloned()
    }

    pub fn trip(&self, id: TripId) -> Option<Trip> {
        self.tables().trips.get(&id).cloned()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Table lock for a write, or the outage error.
    fn writable(&self) -> AppResult<MutexGuard<'_, Tables>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables())
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn load(&self) -> AppResult<StoredState> {
        let tables = self.tables();
        let trips = tables
            .trips
            .values()
            .map(|trip| StoredTrip {
                trip: trip.clone(),
                seats: tables
                    .seats
                    .get(&trip.id)
                    .map(|seats| seats.iter().map(|(seat, _)| seat.clone()).collect())
                    .unwrap_or_default(),
            })
            .collect();

        Ok(StoredState {
            trips,
            bookings: tables.bookings.values().cloned().collect(),
            payments: tables.payments.values().cloned().collect(),
        })
    }

    async fn insert_trip(&self, trip: &Trip, seats: &[Seat]) -> AppResult<()> {
        let mut tables = self.writable()?;
        if tables.trips.contains_key(&trip.id) {
            return Err(AppError::Conflict(format!("trip {} already exists", trip.id)));
        }
        tables.trips.insert(trip.id, trip.clone());
        tables.seats.insert(trip.id, seats.iter().map(|s| (s.clone(), None)).collect());
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> AppResult<()> {
        let mut guard = self.writable()?;
        let tables = &mut *guard;

        if tables.bookings.values().any(|b| b.reference == booking.reference) {
            return Err(AppError::Conflict(format!("booking reference {} is taken", booking.reference)));
        }
        let trip = tables
            .trips
            .get_mut(&booking.trip_id)
            .ok_or_else(|| AppError::not_found(format!("trip {}", booking.trip_id)))?;
        if trip.status != TripStatus::Scheduled {
            return Err(AppError::InvalidState(format!("trip {} is not scheduled", trip.id)));
        }
        let seats = tables.seats.entry(booking.trip_id).or_default();
        let free = seats
            .iter()
            .filter(|(s, _)| booking.seat_labels.contains(&s.label) && s.is_available && !s.is_driver_seat)
            .count();
        if free != booking.seat_labels.len() {
            return Err(AppError::Conflict(format!(
                "only {} of {} requested seats are free",
                free,
                booking.seat_labels.len()
            )));
        }

        for (seat, holder) in seats.iter_mut().filter(|(s, _)| booking.seat_labels.contains(&s.label)) {
            seat.is_available = false;
            *holder = Some(booking.id);
        }
        let count = booking.seat_count();
        trip.available_seats -= count;
        trip.booked_seats += count;
        trip.updated_at = booking.created_at;
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn cancel_booking(&self, booking: &Booking) -> AppResult<()> {
        let mut guard = self.writable()?;
        let tables = &mut *guard;

        match tables.bookings.get(&booking.id) {
            Some(stored) if stored.status == BookingStatus::Pending => {}
            Some(_) => return Err(AppError::InvalidState(format!("booking {} is not pending", booking.id))),
            None => return Err(AppError::not_found(format!("booking {}", booking.id))),
        }

        let mut released = 0;
        for (seat, holder) in tables.seats.entry(booking.trip_id).or_default() {
            if *holder == Some(booking.id) {
                seat.is_available = true;
                *holder = None;
                released += 1;
            }
        }
        if let Some(trip) = tables.trips.get_mut(&booking.trip_id) {
            trip.available_seats += released;
            trip.booked_seats = trip.booked_seats.saturating_sub(released);
            trip.updated_at = booking.updated_at;
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_trip_status(&self, trip: &Trip) -> AppResult<()> {
        let mut tables = self.writable()?;
        let stored = tables
            .trips
            .get_mut(&trip.id)
            .ok_or_else(|| AppError::not_found(format!("trip {}", trip.id)))?;
        stored.status = trip.status;
        stored.updated_at = trip.updated_at;
        Ok(())
    }

    async fn cancel_trip(&self, trip: &Trip, cancelled: &[Booking]) -> AppResult<()> {
        let mut guard = self.writable()?;
        let tables = &mut *guard;

        if !tables.trips.contains_key(&trip.id) {
            return Err(AppError::not_found(format!("trip {}", trip.id)));
        }
        for (seat, holder) in tables.seats.entry(trip.id).or_default() {
            if !seat.is_driver_seat {
                seat.is_available = true;
                *holder = None;
            }
        }
        for booking in cancelled {
            tables.bookings.insert(booking.id, booking.clone());
        }
        tables.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
        let mut tables = self.writable()?;
        let live = tables
            .payments
            .values()
            .any(|p| p.booking_id == payment.booking_id && p.status != PaymentStatus::Failed);
        if live {
            return Err(AppError::Conflict(format!(
                "booking {} already has a live payment",
                payment.booking_id
            )));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn settle_payment(&self, payment: &Payment, confirmed: Option<&Booking>) -> AppResult<()> {
        let mut tables = self.writable()?;

        match tables.payments.get(&payment.id) {
            Some(stored) if stored.status == PaymentStatus::Initiated => {}
            Some(_) => {
                return Err(AppError::Conflict(format!(
                    "payment {} is already settled",
                    payment.transaction_id
                )))
            }
            None => return Err(AppError::not_found(format!("payment {}", payment.transaction_id))),
        }
        if let Some(booking) = confirmed {
            let pending = tables
                .bookings
                .get(&booking.id)
                .is_some_and(|b| b.status == BookingStatus::Pending);
            if !pending {
                return Err(AppError::InvalidState(format!("booking {} is not pending", booking.id)));
            }
            tables.bookings.insert(booking.id, booking.clone());
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }
}
