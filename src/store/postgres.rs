use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;

use super::{StoredState, StoredTrip, TripStore};
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingId, BookingStatus, DriverId, Payment, PaymentId, PaymentStatus, RouteId,
    RoutePointId, Seat, Trip, TripId, TripStatus, UserId, VehicleId,
};

/// Trips, seats, bookings and payments in Postgres.
#[derive(Clone)]
pub struct PgTripStore {
    db: Database,
}

impl PgTripStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct TripRow {
    id: i64,
    route_id: i64,
    vehicle_id: i64,
    driver_id: i64,
    departure_time: NaiveDateTime,
    estimated_arrival_time: NaiveDateTime,
    base_price_per_km: Decimal,
    total_seats: i32,
    available_seats: i32,
    booked_seats: i32,
    status: String,
    special_instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SeatRow {
    trip_id: i64,
    label: String,
    is_available: bool,
    is_driver_seat: bool,
}

#[derive(FromRow)]
struct BookingRow {
    id: i64,
    reference: String,
    rider_id: i64,
    trip_id: i64,
    boarding_point_id: i64,
    drop_point_id: i64,
    boarding_point_name: String,
    drop_point_name: String,
    seat_labels: Vec<String>,
    total_amount: Decimal,
    distance_km: Decimal,
    status: String,
    passenger_names: Option<String>,
    passenger_contacts: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct PaymentRow {
    id: i64,
    transaction_id: String,
    booking_id: i64,
    amount: Decimal,
    status: String,
    gateway_response: Option<String>,
    failure_reason: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status<T: FromStr<Err = String>>(raw: &str) -> AppResult<T> {
    raw.parse().map_err(AppError::Internal)
}

fn count(value: i32) -> u32 {
    value.max(0) as u32
}

impl TryFrom<TripRow> for Trip {
    type Error = AppError;

    fn try_from(row: TripRow) -> AppResult<Self> {
        Ok(Trip {
            id: TripId(row.id),
            route_id: RouteId(row.route_id),
            vehicle_id: VehicleId(row.vehicle_id),
            driver_id: DriverId(row.driver_id),
            departure_time: row.departure_time,
            estimated_arrival_time: row.estimated_arrival_time,
            base_price_per_km: row.base_price_per_km,
            total_seats: count(row.total_seats),
            available_seats: count(row.available_seats),
            booked_seats: count(row.booked_seats),
            status: status::<TripStatus>(&row.status)?,
            special_instructions: row.special_instructions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> AppResult<Self> {
        Ok(Booking {
            id: BookingId(row.id),
            reference: row.reference,
            rider_id: UserId(row.rider_id),
            trip_id: TripId(row.trip_id),
            boarding_point_id: RoutePointId(row.boarding_point_id),
            drop_point_id: RoutePointId(row.drop_point_id),
            boarding_point_name: row.boarding_point_name,
            drop_point_name: row.drop_point_name,
            seat_labels: row.seat_labels,
            total_amount: row.total_amount,
            distance_km: row.distance_km,
            status: status::<BookingStatus>(&row.status)?,
            passenger_names: row.passenger_names,
            passenger_contacts: row.passenger_contacts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> AppResult<Self> {
        Ok(Payment {
            id: PaymentId(row.id),
            transaction_id: row.transaction_id,
            booking_id: BookingId(row.booking_id),
            amount: row.amount,
            status: status::<PaymentStatus>(&row.status)?,
            gateway_response: row.gateway_response,
            failure_reason: row.failure_reason,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Unique violations become `Conflict`; anything else stays a database error.
fn unique_as_conflict(e: sqlx::Error, what: String) -> AppError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict(what),
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn load(&self) -> AppResult<StoredState> {
        let pool = &self.db.pool;

        let trip_rows = sqlx::query_as::<_, TripRow>(
            "SELECT id, route_id, vehicle_id, driver_id, departure_time, estimated_arrival_time,
                    base_price_per_km, total_seats, available_seats, booked_seats, status,
                    special_instructions, created_at, updated_at
             FROM trips ORDER BY id",
        )
        .fetch_all(pool)
        .await?;

        let seat_rows = sqlx::query_as::<_, SeatRow>(
            "SELECT trip_id, label, is_available, is_driver_seat
             FROM trip_seats ORDER BY trip_id, position",
        )
        .fetch_all(pool)
        .await?;

        let booking_rows = sqlx::query_as::<_, BookingRow>(
            "SELECT id, reference, rider_id, trip_id, boarding_point_id, drop_point_id,
                    boarding_point_name, drop_point_name, seat_labels, total_amount, distance_km,
                    status, passenger_names, passenger_contacts, created_at, updated_at
             FROM bookings ORDER BY id",
        )
        .fetch_all(pool)
        .await?;

        let payment_rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, transaction_id, booking_id, amount, status, gateway_response,
                    failure_reason, paid_at, created_at, updated_at
             FROM payments ORDER BY id",
        )
        .fetch_all(pool)
        .await?;

        let mut seats: HashMap<i64, Vec<Seat>> = HashMap::new();
        for row in seat_rows {
            seats.entry(row.trip_id).or_default().push(Seat {
                label: row.label,
                is_available: row.is_available,
                is_driver_seat: row.is_driver_seat,
            });
        }

        let trips = trip_rows
            .into_iter()
            .map(|row| {
                let seats = seats.remove(&row.id).unwrap_or_default();
                Ok(StoredTrip { trip: Trip::try_from(row)?, seats })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(StoredState {
            trips,
            bookings: booking_rows.into_iter().map(Booking::try_from).collect::<AppResult<_>>()?,
            payments: payment_rows.into_iter().map(Payment::try_from).collect::<AppResult<_>>()?,
        })
    }

    async fn insert_trip(&self, trip: &Trip, seats: &[Seat]) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;

        sqlx::query(
            "INSERT INTO trips (id, route_id, vehicle_id, driver_id, departure_time,
                                estimated_arrival_time, base_price_per_km, total_seats,
                                available_seats, booked_seats, status, special_instructions,
                                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(trip.id.0)
        .bind(trip.route_id.0)
        .bind(trip.vehicle_id.0)
        .bind(trip.driver_id.0)
        .bind(trip.departure_time)
        .bind(trip.estimated_arrival_time)
        .bind(trip.base_price_per_km)
        .bind(trip.total_seats as i32)
        .bind(trip.available_seats as i32)
        .bind(trip.booked_seats as i32)
        .bind(trip.status.as_str())
        .bind(trip.special_instructions.as_deref())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, format!("trip {} already exists", trip.id)))?;

        for (position, seat) in seats.iter().enumerate() {
            sqlx::query(
                "INSERT INTO trip_seats (trip_id, position, label, is_available, is_driver_seat)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(trip.id.0)
            .bind(position as i32)
            .bind(&seat.label)
            .bind(seat.is_available)
            .bind(seat.is_driver_seat)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;
        let seat_count = booking.seat_labels.len() as i32;

        // Counters first: the row lock on the trip orders concurrent writers.
        let scheduled = sqlx::query(
            "UPDATE trips
             SET available_seats = available_seats - $2,
                 booked_seats = booked_seats + $2,
                 updated_at = $3
             WHERE id = $1 AND status = 'SCHEDULED' AND available_seats >= $2",
        )
        .bind(booking.trip_id.0)
        .bind(seat_count)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if scheduled != 1 {
            let _ = tx.rollback().await;
            return Err(AppError::InvalidState(format!(
                "trip {} is not scheduled or has fewer than {} free seats",
                booking.trip_id, seat_count
            )));
        }

        sqlx::query(
            "INSERT INTO bookings (id, reference, rider_id, trip_id, boarding_point_id,
                                   drop_point_id, boarding_point_name, drop_point_name,
                                   seat_labels, total_amount, distance_km, status,
                                   passenger_names, passenger_contacts, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(booking.id.0)
        .bind(&booking.reference)
        .bind(booking.rider_id.0)
        .bind(booking.trip_id.0)
        .bind(booking.boarding_point_id.0)
        .bind(booking.drop_point_id.0)
        .bind(&booking.boarding_point_name)
        .bind(&booking.drop_point_name)
        .bind(booking.seat_labels.as_slice())
        .bind(booking.total_amount)
        .bind(booking.distance_km)
        .bind(booking.status.as_str())
        .bind(booking.passenger_names.as_deref())
        .bind(booking.passenger_contacts.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, format!("booking reference {} is taken", booking.reference)))?;

        // FREE -> held, only for seats nobody holds.
        let reserved = sqlx::query(
            "UPDATE trip_seats
             SET is_available = false, booking_id = $3
             WHERE trip_id = $1 AND label = ANY($2) AND is_available AND NOT is_driver_seat",
        )
        .bind(booking.trip_id.0)
        .bind(booking.seat_labels.as_slice())
        .bind(booking.id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if reserved != booking.seat_labels.len() as u64 {
            let _ = tx.rollback().await;
            return Err(AppError::Conflict(format!(
                "only {} of {} requested seats are free",
                reserved,
                booking.seat_labels.len()
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn cancel_booking(&self, booking: &Booking) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = $3
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(booking.id.0)
        .bind(booking.status.as_str())
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated != 1 {
            let _ = tx.rollback().await;
            return Err(AppError::InvalidState(format!("booking {} is not pending", booking.id)));
        }

        let freed = sqlx::query_scalar::<_, String>(
            "UPDATE trip_seats SET is_available = true, booking_id = NULL
             WHERE booking_id = $1 AND NOT is_available
             RETURNING label",
        )
        .bind(booking.id.0)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE trips
             SET available_seats = available_seats + $2,
                 booked_seats = booked_seats - $2,
                 updated_at = $3
             WHERE id = $1",
        )
        .bind(booking.trip_id.0)
        .bind(freed.len() as i32)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_trip_status(&self, trip: &Trip) -> AppResult<()> {
        let updated = sqlx::query("UPDATE trips SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(trip.id.0)
            .bind(trip.status.as_str())
            .bind(trip.updated_at)
            .execute(&self.db.pool)
            .await?
            .rows_affected();
        if updated != 1 {
            return Err(AppError::not_found(format!("trip {}", trip.id)));
        }
        Ok(())
    }

    async fn cancel_trip(&self, trip: &Trip, cancelled: &[Booking]) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE trips
             SET status = $2, available_seats = $3, booked_seats = $4, updated_at = $5
             WHERE id = $1 AND status = 'SCHEDULED'",
        )
        .bind(trip.id.0)
        .bind(trip.status.as_str())
        .bind(trip.available_seats as i32)
        .bind(trip.booked_seats as i32)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated != 1 {
            let _ = tx.rollback().await;
            return Err(AppError::InvalidState(format!("trip {} is not scheduled", trip.id)));
        }

        let ids: Vec<i64> = cancelled.iter().map(|b| b.id.0).collect();
        sqlx::query(
            "UPDATE bookings SET status = 'CANCELLED', updated_at = $2
             WHERE id = ANY($1) AND status = 'PENDING'",
        )
        .bind(ids.as_slice())
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE trip_seats SET is_available = true, booking_id = NULL
             WHERE trip_id = $1 AND NOT is_driver_seat",
        )
        .bind(trip.id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, transaction_id, booking_id, amount, status,
                                   gateway_response, failure_reason, paid_at,
                                   created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(payment.id.0)
        .bind(&payment.transaction_id)
        .bind(payment.booking_id.0)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.gateway_response.as_deref())
        .bind(payment.failure_reason.as_deref())
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.db.pool)
        .await
        .map_err(|e| {
            unique_as_conflict(e, format!("booking {} already has a live payment", payment.booking_id))
        })?;
        Ok(())
    }

    async fn settle_payment(&self, payment: &Payment, confirmed: Option<&Booking>) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;

        let settled = sqlx::query(
            "UPDATE payments
             SET status = $2, gateway_response = $3, failure_reason = $4, paid_at = $5,
                 updated_at = $6
             WHERE id = $1 AND status = 'INITIATED'",
        )
        .bind(payment.id.0)
        .bind(payment.status.as_str())
        .bind(payment.gateway_response.as_deref())
        .bind(payment.failure_reason.as_deref())
        .bind(payment.paid_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if settled != 1 {
            let _ = tx.rollback().await;
            return Err(AppError::Conflict(format!(
                "payment {} is already settled",
                payment.transaction_id
            )));
        }

        if let Some(booking) = confirmed {
            let updated = sqlx::query(
                "UPDATE bookings SET status = $2, updated_at = $3
                 WHERE id = $1 AND status = 'PENDING'",
            )
            .bind(booking.id.0)
            .bind(booking.status.as_str())
            .bind(booking.updated_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated != 1 {
                let _ = tx.rollback().await;
                return Err(AppError::InvalidState(format!("booking {} is not pending", booking.id)));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
