use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{BookingId, RoutePointId, TripId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Seats are held, payment has not gone through yet.
    Pending,
    /// Paid. Terminal for the booking core.
    Confirmed,
    /// Seats were returned to the trip. Terminal.
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// A rider's claim on a set of seats for one segment of a trip.
/// Bookings are never deleted; cancellation is a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Human-readable `BK...` reference, unique across all bookings.
    pub reference: String,
    pub rider_id: UserId,
    pub trip_id: TripId,
    pub boarding_point_id: RoutePointId,
    pub drop_point_id: RoutePointId,
    /// `"<city> - <sub_location>"` of the boarding stop at booking time.
    pub boarding_point_name: String,
    /// `"<city> - <sub_location>"` of the drop stop at booking time.
    pub drop_point_name: String,
    /// Exact seats held, non-empty and distinct.
    pub seat_labels: Vec<String>,
    /// Fare for all seats, two decimal places.
    pub total_amount: Decimal,
    /// Length of the booked segment.
    pub distance_km: Decimal,
    pub status: BookingStatus,
    /// Free text supplied by the rider.
    pub passenger_names: Option<String>,
    /// Free text supplied by the rider.
    pub passenger_contacts: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn seat_count(&self) -> u32 {
        self.seat_labels.len() as u32
    }

    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

/// Input for reserving seats.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub rider_id: UserId,
    pub trip_id: TripId,
    pub boarding_point_id: RoutePointId,
    pub drop_point_id: RoutePointId,
    pub seat_labels: Vec<String>,
    pub passenger_names: Option<String>,
    pub passenger_contacts: Option<String>,
}

/// Booking as presented to the rider.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub booking_id: BookingId,
    pub booking_reference: String,
    pub trip_id: TripId,
    pub boarding_point: String,
    pub drop_point: String,
    pub departure_time: NaiveDateTime,
    pub seat_numbers: Vec<String>,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub driver_name: String,
    pub driver_phone: String,
    pub vehicle_details: String,
    pub booked_at: DateTime<Utc>,
}
