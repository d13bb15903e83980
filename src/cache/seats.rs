use async_trait::async_trait;
use redis::AsyncCommands;

use crate::cache::{CacheService, SeatCache};
use crate::models::{SeatAvailability, TripId};
use tracing::{debug, warn};

const SEATS_TTL_SECS: u64 = 60;

fn seats_key(trip_id: TripId) -> String {
    format!("seats:{}", trip_id)
}

#[async_trait]
impl SeatCache for CacheService {
    async fn get_seat_availability(&self, trip_id: TripId) -> Option<SeatAvailability> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get(seats_key(trip_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!(trip_id = %trip_id, "Seat cache read failed: {}", e);
                return None;
            }
        };
        let availability = serde_json::from_str(&data?).ok();
        if availability.is_some() {
            debug!(trip_id = %trip_id, "Seat cache hit");
        }
        availability
    }

    async fn save_seat_availability(&self, availability: &SeatAvailability) {
        let Ok(data) = serde_json::to_string(availability) else {
            return;
        };
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> =
            conn.set_ex(seats_key(availability.trip_id), data, SEATS_TTL_SECS).await;
        if let Err(e) = result {
            warn!(trip_id = %availability.trip_id, "Seat cache write failed: {}", e);
        }
    }

    async fn invalidate_seats(&self, trip_id: TripId) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn.del(seats_key(trip_id)).await;
        if let Err(e) = result {
            warn!(trip_id = %trip_id, "Seat cache invalidation failed: {}", e);
        }
    }
}
