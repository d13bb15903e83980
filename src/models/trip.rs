use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{DriverId, RouteId, TripId, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// Open for bookings.
    Scheduled,
    /// The ride happened. No further bookings.
    Completed,
    /// Called off by the driver. Pending bookings were cancelled with it.
    Cancelled,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Scheduled => "SCHEDULED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(TripStatus::Scheduled),
            "COMPLETED" => Ok(TripStatus::Completed),
            "CANCELLED" => Ok(TripStatus::Cancelled),
            other => Err(format!("unknown trip status '{}'", other)),
        }
    }
}

/// One scheduled departure of a route with a fixed vehicle and driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub departure_time: NaiveDateTime,
    /// Departure plus the route's estimated duration.
    pub estimated_arrival_time: NaiveDateTime,
    /// Fare rate; must be positive.
    pub base_price_per_km: Decimal,
    /// Passenger seats plus the driver seat.
    pub total_seats: u32,
    /// Passenger seats not held by any active booking.
    pub available_seats: u32,
    /// Passenger seats held by active bookings.
    pub booked_seats: u32,
    pub status: TripStatus,
    /// Free text from the driver.
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn passenger_seat_count(&self) -> u32 {
        self.total_seats.saturating_sub(1)
    }

    pub fn is_bookable(&self) -> bool {
        self.status == TripStatus::Scheduled
    }
}

/// Input for scheduling a trip.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub route_id: RouteId,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub departure_time: NaiveDateTime,
    pub base_price_per_km: Decimal,
    pub special_instructions: Option<String>,
}

/// One trip matching a search, priced for the searched segment.
#[derive(Debug, Clone, Serialize)]
pub struct TripSearchResult {
    pub trip_id: TripId,
    pub route_name: String,
    pub driver_name: String,
    pub driver_phone: String,
    pub driver_rating: f64,
    pub vehicle: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub available_seats: u32,
    pub price_per_km: Decimal,
    pub price_per_seat: Decimal,
    pub distance_km: Decimal,
    pub duration_minutes: i32,
}
