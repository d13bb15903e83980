use serde::{Deserialize, Serialize};

/// Label of the single non-bookable seat in every trip.
pub const DRIVER_SEAT_LABEL: &str = "D1";

pub fn passenger_seat_label(number: u32) -> String {
    format!("S{}", number)
}

/// One slot of a trip's seat pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// `D1` for the driver, `S1..Sn` for passengers.
    pub label: String,
    /// False while an active booking holds the seat; always false for the driver seat.
    pub is_available: bool,
    pub is_driver_seat: bool,
}

impl Seat {
    pub fn driver() -> Self {
        Self { label: DRIVER_SEAT_LABEL.to_string(), is_available: false, is_driver_seat: true }
    }

    pub fn passenger(number: u32) -> Self {
        Self { label: passenger_seat_label(number), is_available: true, is_driver_seat: false }
    }
}

/// Per-trip seat availability as shown to riders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub trip_id: super::TripId,
    /// Passenger seats only.
    pub total_seats: u32,
    /// Passenger seats still free.
    pub available_seats: u32,
    /// Whole pool in label order, driver seat first.
    pub seats: Vec<Seat>,
}
