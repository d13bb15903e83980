use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::SeatCache;
use crate::models::{SeatAvailability, TripId};

/// Seat cache in a map; no expiry.
#[derive(Debug, Default)]
pub struct InMemorySeatCache {
    entries: Mutex<HashMap<TripId, SeatAvailability>>,
}

impl InMemorySeatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// What is cached for the trip right now.
    pub fn peek(&self, trip_id: TripId) -> Option<SeatAvailability> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(&trip_id).cloned()
    }
}

#[async_trait]
impl SeatCache for InMemorySeatCache {
    async fn get_seat_availability(&self, trip_id: TripId) -> Option<SeatAvailability> {
        self.peek(trip_id)
    }

    async fn save_seat_availability(&self, availability: &SeatAvailability) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(availability.trip_id, availability.clone());
    }

    async fn invalidate_seats(&self, trip_id: TripId) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(&trip_id);
    }
}
