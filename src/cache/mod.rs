use async_trait::async_trait;

use crate::models::{SeatAvailability, TripId};
use crate::redis_client::RedisClient;

pub mod memory;
pub mod seats;

pub use memory::InMemorySeatCache;

/// Read-through cache of per-trip seat maps.
///
/// Writes and invalidations are issued while the trip's mutex is held, so a
/// saved snapshot can never land after the invalidation of a later change.
#[async_trait]
pub trait SeatCache: Send + Sync {
    async fn get_seat_availability(&self, trip_id: TripId) -> Option<SeatAvailability>;

    async fn save_seat_availability(&self, availability: &SeatAvailability);

    /// Drops the cached seat map after any change to the trip.
    async fn invalidate_seats(&self, trip_id: TripId);
}

/// Redis-backed seat cache. Every method swallows Redis failures: a miss or
/// an outage only costs a ledger read.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}
