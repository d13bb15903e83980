//! In-process state of every trip.
//!
//! Each trip owns its seat pool, its bookings and their payments inside a
//! single `TripLedger` guarded by one async mutex. All mutations of booking,
//! seat and counter state for a trip happen while that mutex is held, which
//! makes it the serialization point for reservations. Under that mutex a
//! change is first written to the `TripStore` and only then applied here, so
//! a failed write leaves both copies as they were. Cross-trip lookups
//! (booking id, reference, transaction id) go through small indexes that are
//! only ever locked briefly and never across an `.await`.

use chrono::Utc;
use std::collections::{hash_map::Entry, BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::inventory::SeatInventory;
use crate::cache::SeatCache;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingId, DriverId, Payment, PaymentId, PaymentStatus, RouteId, SeatAvailability,
    Trip, TripId, VehicleId,
};
use crate::store::TripStore;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Everything owned by one trip.
#[derive(Debug)]
pub struct TripLedger {
    pub trip: Trip,
    pub seats: SeatInventory,
    bookings: BTreeMap<BookingId, Booking>,
    payments: BTreeMap<BookingId, Vec<Payment>>,
}

impl TripLedger {
    pub fn new(trip: Trip, seats: SeatInventory) -> Self {
        Self { trip, seats, bookings: BTreeMap::new(), payments: BTreeMap::new() }
    }

    pub fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.get(&id)
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    /// Adds a booking or replaces the one with the same id.
    pub fn insert_booking(&mut self, booking: Booking) {
        self.bookings.insert(booking.id, booking);
    }

    /// Payment attempts for a booking, oldest first.
    pub fn payments(&self, booking_id: BookingId) -> &[Payment] {
        self.payments.get(&booking_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn payment(&self, booking_id: BookingId, id: PaymentId) -> Option<&Payment> {
        self.payments(booking_id).iter().find(|p| p.id == id)
    }

    pub fn all_payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values().flatten()
    }

    pub fn push_payment(&mut self, payment: Payment) {
        self.payments.entry(payment.booking_id).or_default().push(payment);
    }

    /// Overwrites the attempt with the same id; no-op if there is none.
    pub fn replace_payment(&mut self, payment: Payment) {
        let slot = self
            .payments
            .get_mut(&payment.booking_id)
            .and_then(|attempts| attempts.iter_mut().find(|p| p.id == payment.id));
        if let Some(slot) = slot {
            *slot = payment;
        }
    }

    /// Lists every violated cross-entity invariant of this trip.
    pub fn audit(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let trip = &self.trip;
        let passenger_seats = self.seats.passenger_count();

        if passenger_seats != trip.passenger_seat_count() {
            violations.push(format!(
                "seat pool has {} passenger seats, trip declares {}",
                passenger_seats,
                trip.passenger_seat_count()
            ));
        }
        if trip.available_seats + trip.booked_seats != passenger_seats {
            violations.push(format!(
                "available ({}) + booked ({}) != passenger seats ({})",
                trip.available_seats, trip.booked_seats, passenger_seats
            ));
        }
        if self.seats.available_count() != trip.available_seats {
            violations.push(format!(
                "{} seats are free but the trip counts {} available",
                self.seats.available_count(),
                trip.available_seats
            ));
        }

        let mut holders: HashMap<&str, BookingId> = HashMap::new();
        for booking in self.bookings.values().filter(|b| b.is_active()) {
            let distinct: HashSet<&str> = booking.seat_labels.iter().map(String::as_str).collect();
            if distinct.len() != booking.seat_labels.len() || distinct.is_empty() {
                violations.push(format!("booking {} has an empty or repeated seat list", booking.id));
            }
            for label in &booking.seat_labels {
                match self.seats.get(label) {
                    Some(seat) if !seat.is_driver_seat && !seat.is_available => {}
                    _ => violations.push(format!(
                        "booking {} holds seat {} which is not a reserved passenger seat",
                        booking.id, label
                    )),
                }
                if let Some(other) = holders.insert(label.as_str(), booking.id) {
                    if other != booking.id {
                        violations.push(format!(
                            "seat {} is held by bookings {} and {}",
                            label, other, booking.id
                        ));
                    }
                }
            }
        }

        for seat in self.seats.seats().iter().filter(|s| !s.is_driver_seat && !s.is_available) {
            if !holders.contains_key(seat.label.as_str()) {
                violations.push(format!("seat {} is unavailable but held by no booking", seat.label));
            }
        }

        for (booking_id, attempts) in &self.payments {
            let live = attempts.iter().filter(|p| p.status != PaymentStatus::Failed).count();
            if live > 1 {
                violations.push(format!("booking {} has {} non-failed payments", booking_id, live));
            }
        }

        violations
    }
}

/// A trip's mutex together with the fields that never change after creation.
#[derive(Debug)]
pub struct TripEntry {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    state: Mutex<TripLedger>,
}

impl TripEntry {
    fn new(ledger: TripLedger) -> Arc<Self> {
        Arc::new(Self {
            trip_id: ledger.trip.id,
            route_id: ledger.trip.route_id,
            driver_id: ledger.trip.driver_id,
            vehicle_id: ledger.trip.vehicle_id,
            state: Mutex::new(ledger),
        })
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, TripLedger> {
        self.state.lock().await
    }
}

/// Rolling sequence span of booking references within one second.
const REFERENCE_SEQ_SPAN: u64 = 10_000;

pub struct Ledger {
    /// Durable copy of everything below; written before memory changes.
    store: Arc<dyn TripStore>,
    cache: Option<Arc<dyn SeatCache>>,
    trips: RwLock<BTreeMap<TripId, Arc<TripEntry>>>,
    booking_trips: RwLock<HashMap<BookingId, TripId>>,
    references: RwLock<HashMap<String, BookingId>>,
    transactions: RwLock<HashMap<String, BookingId>>,
    next_trip_id: AtomicI64,
    next_booking_id: AtomicI64,
    next_payment_id: AtomicI64,
    reference_seq: AtomicU64,
}

impl Ledger {
    /// Empty ledger over `store`. Use `restore` when the store may hold data.
    pub fn new(store: Arc<dyn TripStore>, cache: Option<Arc<dyn SeatCache>>) -> Self {
        Self {
            store,
            cache,
            trips: RwLock::new(BTreeMap::new()),
            booking_trips: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
            transactions: RwLock::new(HashMap::new()),
            next_trip_id: AtomicI64::new(1),
            next_booking_id: AtomicI64::new(1),
            next_payment_id: AtomicI64::new(1),
            reference_seq: AtomicU64::new(0),
        }
    }

    /// Rebuilds the ledger from everything the store holds.
    pub async fn restore(store: Arc<dyn TripStore>, cache: Option<Arc<dyn SeatCache>>) -> AppResult<Self> {
        let stored = store.load().await?;
        let ledger = Self::new(store, cache);

        let mut trips: BTreeMap<TripId, TripLedger> = stored
            .trips
            .into_iter()
            .map(|t| (t.trip.id, TripLedger::new(t.trip, SeatInventory::from_seats(t.seats))))
            .collect();

        let mut max_booking = 0;
        for booking in stored.bookings {
            let trip = trips.get_mut(&booking.trip_id).ok_or_else(|| {
                AppError::Internal(format!("booking {} references unknown trip {}", booking.id, booking.trip_id))
            })?;
            max_booking = max_booking.max(booking.id.0);
            write(&ledger.booking_trips).insert(booking.id, booking.trip_id);
            write(&ledger.references).insert(booking.reference.clone(), booking.id);
            trip.insert_booking(booking);
        }

        let mut max_payment = 0;
        for payment in stored.payments {
            let trip_id = ledger.trip_of(payment.booking_id)?;
            let trip = trips.get_mut(&trip_id).ok_or_else(|| {
                AppError::Internal(format!("payment {} has no trip", payment.transaction_id))
            })?;
            max_payment = max_payment.max(payment.id.0);
            write(&ledger.transactions).insert(payment.transaction_id.clone(), payment.booking_id);
            trip.push_payment(payment);
        }

        let max_trip = trips.keys().next_back().map_or(0, |id| id.0);
        ledger.next_trip_id.store(max_trip + 1, Ordering::Relaxed);
        ledger.next_booking_id.store(max_booking + 1, Ordering::Relaxed);
        ledger.next_payment_id.store(max_payment + 1, Ordering::Relaxed);

        for (trip_id, trip) in trips {
            let violations = trip.audit();
            if !violations.is_empty() {
                warn!(trip_id = %trip_id, ?violations, "Restored trip is inconsistent");
            }
            write(&ledger.trips).insert(trip_id, TripEntry::new(trip));
        }

        info!(
            trips = read(&ledger.trips).len(),
            bookings = read(&ledger.booking_trips).len(),
            payments = read(&ledger.transactions).len(),
            "Ledger restored"
        );
        Ok(ledger)
    }

    pub fn store(&self) -> &dyn TripStore {
        self.store.as_ref()
    }

    pub async fn cached_seats(&self, trip_id: TripId) -> Option<SeatAvailability> {
        match &self.cache {
            Some(cache) => cache.get_seat_availability(trip_id).await,
            None => None,
        }
    }

    /// Call with the trip's mutex held.
    pub async fn cache_seats(&self, availability: &SeatAvailability) {
        if let Some(cache) = &self.cache {
            cache.save_seat_availability(availability).await;
        }
    }

    /// Call with the trip's mutex held, after the change was applied.
    pub async fn invalidate_seats(&self, trip_id: TripId) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(trip_id).await;
        }
    }

    pub fn next_trip_id(&self) -> TripId {
        TripId(self.next_trip_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_booking_id(&self) -> BookingId {
        BookingId(self.next_booking_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_payment_id(&self) -> PaymentId {
        PaymentId(self.next_payment_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a freshly created trip together with its seat pool.
    pub fn insert_trip(&self, trip: Trip, seats: SeatInventory) -> Arc<TripEntry> {
        let entry = TripEntry::new(TripLedger::new(trip, seats));
        write(&self.trips).insert(entry.trip_id, entry.clone());
        entry
    }

    pub fn entry(&self, trip_id: TripId) -> AppResult<Arc<TripEntry>> {
        read(&self.trips)
            .get(&trip_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("trip {}", trip_id)))
    }

    /// Snapshot of all trip handles, in id order.
    pub fn entries(&self) -> Vec<Arc<TripEntry>> {
        read(&self.trips).values().cloned().collect()
    }

    pub fn trip_of(&self, booking_id: BookingId) -> AppResult<TripId> {
        read(&self.booking_trips)
            .get(&booking_id)
            .copied()
            .ok_or_else(|| AppError::not_found(format!("booking {}", booking_id)))
    }

    pub fn index_booking(&self, booking_id: BookingId, trip_id: TripId) {
        write(&self.booking_trips).insert(booking_id, trip_id);
    }

    pub fn booking_for_reference(&self, reference: &str) -> Option<BookingId> {
        read(&self.references).get(reference).copied()
    }

    pub fn booking_for_transaction(&self, transaction_id: &str) -> Option<BookingId> {
        read(&self.transactions).get(transaction_id).copied()
    }

    /// Draws a booking reference that no other booking uses and binds it.
    ///
    /// `BK` + second-resolution timestamp + a rolling 4-digit sequence. Once
    /// a whole sequence span is taken within the same second, the suffix
    /// switches to 8 hex chars of a v4 UUID instead of waiting for the clock.
    pub fn claim_reference(&self, booking_id: BookingId) -> String {
        let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        self.claim_reference_at(booking_id, &stamp)
    }

    fn claim_reference_at(&self, booking_id: BookingId, stamp: &str) -> String {
        let mut references = write(&self.references);
        for _ in 0..REFERENCE_SEQ_SPAN {
            let seq = self.reference_seq.fetch_add(1, Ordering::Relaxed) % REFERENCE_SEQ_SPAN;
            if let Entry::Vacant(slot) = references.entry(format!("BK{}{:04}", stamp, seq)) {
                let reference = slot.key().clone();
                slot.insert(booking_id);
                return reference;
            }
        }
        loop {
            if let Entry::Vacant(slot) = references.entry(format!("BK{}{}", stamp, hex_suffix())) {
                let reference = slot.key().clone();
                slot.insert(booking_id);
                return reference;
            }
        }
    }

    /// Unbinds a reference whose booking was never stored.
    pub fn release_reference(&self, reference: &str) {
        write(&self.references).remove(reference);
    }

    /// Draws a unique payment transaction id and binds it to the booking.
    pub fn claim_transaction_id(&self, booking_id: BookingId) -> String {
        let mut transactions = write(&self.transactions);
        loop {
            let candidate = format!("TXN{}{}", Utc::now().format("%Y%m%d%H%M%S"), hex_suffix());
            if let Entry::Vacant(slot) = transactions.entry(candidate.clone()) {
                slot.insert(booking_id);
                return candidate;
            }
        }
    }

    /// Unbinds a transaction id whose payment was never stored.
    pub fn release_transaction_id(&self, transaction_id: &str) {
        write(&self.transactions).remove(transaction_id);
    }
}

fn hex_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
