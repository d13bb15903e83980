//! Durable record of trips, seat pools, bookings and payments.
//!
//! The ledger stays the serialization point: every write below is issued
//! while the owning trip's mutex is held, and the in-process state is only
//! changed after the store accepted the write. On startup the ledger is
//! rebuilt from `load`.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Booking, Payment, Seat, Trip};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTripStore;
pub use postgres::PgTripStore;

/// A trip row with its seat pool, driver seat first.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrip {
    pub trip: Trip,
    pub seats: Vec<Seat>,
}

/// Everything needed to rebuild the ledger.
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    pub trips: Vec<StoredTrip>,
    /// Ordered by id.
    pub bookings: Vec<Booking>,
    /// Ordered by id, so attempts of one booking come oldest first.
    pub payments: Vec<Payment>,
}

#[async_trait]
pub trait TripStore: Send + Sync {
    async fn load(&self) -> AppResult<StoredState>;

    /// Trip and its seat pool in one transaction.
    async fn insert_trip(&self, trip: &Trip, seats: &[Seat]) -> AppResult<()>;

    /// Inserts the booking, takes its seats and moves the trip counters.
    /// `Conflict` if any seat is no longer free, `InvalidState` if the trip
    /// is no longer scheduled; nothing is written in either case.
    async fn insert_booking(&self, booking: &Booking) -> AppResult<()>;

    /// Writes the cancelled booking, frees its seats and moves the counters back.
    async fn cancel_booking(&self, booking: &Booking) -> AppResult<()>;

    /// Status change without seat movement (completion).
    async fn update_trip_status(&self, trip: &Trip) -> AppResult<()>;

    /// Cancels the trip and the given pending bookings, freeing every passenger seat.
    async fn cancel_trip(&self, trip: &Trip, cancelled: &[Booking]) -> AppResult<()>;

    /// Records an INITIATED attempt. `Conflict` if the booking already has
    /// a payment that is not FAILED.
    async fn insert_payment(&self, payment: &Payment) -> AppResult<()>;

    /// Writes the outcome of an INITIATED attempt and, when given, the
    /// booking it confirms, in one transaction.
    async fn settle_payment(&self, payment: &Payment, confirmed: Option<&Booking>) -> AppResult<()>;
}
