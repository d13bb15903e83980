use serde::{Deserialize, Serialize};

use super::{DriverId, UserId, VehicleId};

/// Active user account allowed to book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Driver profile joined with the owning user's name and phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    /// User account behind the profile.
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    /// Average rider rating, 0 to 5.
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Owner; trips may only pair a vehicle with its own driver.
    pub driver_id: DriverId,
    pub registration_number: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    /// Including the driver seat.
    pub total_seats: u32,
    /// `total_seats - 1`; sizes the seat pool of every trip.
    pub passenger_seats: u32,
    pub is_active: bool,
}

impl Vehicle {
    pub fn description(&self) -> String {
        format!("{} {} ({}) - {}", self.brand, self.model, self.color, self.registration_number)
    }
}
