//! Distance-based pricing.
//!
//! Offsets are stored in meters; rates are per kilometer. Distances keep
//! full precision (at most three fractional digits), amounts are rounded to
//! two decimal places, midpoint away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::RoutePoint;

pub const MONEY_SCALE: u32 = 2;

const METERS_PER_KM: i64 = 1000;

/// Kilometers between two stops of the same route.
pub fn segment_distance_km(boarding: &RoutePoint, drop: &RoutePoint) -> Decimal {
    let meters = i64::from(drop.distance_from_start) - i64::from(boarding.distance_from_start);
    Decimal::from(meters) / Decimal::from(METERS_PER_KM)
}

/// Rounds to cents and always carries two fractional digits.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Price of one seat over the segment.
pub fn seat_price(distance_km: Decimal, price_per_km: Decimal) -> Decimal {
    round_money(distance_km * price_per_km)
}

/// `distance_km * price_per_km * seat_count`, rounded once at the end.
pub fn fare(distance_km: Decimal, price_per_km: Decimal, seat_count: usize) -> Decimal {
    round_money(distance_km * price_per_km * Decimal::from(seat_count as u64))
}
