use serde::{Deserialize, Serialize};

use super::{DriverId, RouteId, RoutePointId};
use crate::error::{AppError, AppResult};

/// One stop on a route with its cumulative offsets from the first stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: RoutePointId,
    pub route_id: RouteId,
    pub city: String,
    pub sub_location: String,
    /// Display name, `"<city> - <sub_location>"`.
    pub point_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Position on the route, strictly increasing.
    pub sequence_order: i32,
    /// Meters from the first stop.
    pub distance_from_start: i32,
    /// Minutes from the first stop.
    pub time_from_start: i32,
    /// Riders may get on here.
    pub is_boarding_point: bool,
    /// Riders may get off here.
    pub is_drop_point: bool,
}

impl RoutePoint {
    pub fn display_name(city: &str, sub_location: &str) -> String {
        format!("{} - {}", city, sub_location)
    }
}

/// A path a driver services repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub driver_id: DriverId,
    pub route_name: String,
    /// Kilometers.
    pub total_distance: f64,
    /// Minutes.
    pub estimated_duration: i32,
    pub is_active: bool,
    /// Ordered by `sequence_order`.
    pub points: Vec<RoutePoint>,
}

impl Route {
    pub fn point(&self, id: RoutePointId) -> Option<&RoutePoint> {
        self.points.iter().find(|p| p.id == id)
    }

    /// Checks that stops are ordered with strictly increasing sequence and offsets.
    pub fn validate(&self) -> AppResult<()> {
        if self.points.len() < 2 {
            return Err(AppError::InvalidRequest(format!(
                "route {} needs at least two stops",
                self.id
            )));
        }

        for pair in self.points.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.route_id != self.id || prev.route_id != self.id {
                return Err(AppError::InvalidRequest(format!(
                    "route {} contains a stop of another route",
                    self.id
                )));
            }
            if next.sequence_order <= prev.sequence_order
                || next.distance_from_start <= prev.distance_from_start
                || next.time_from_start <= prev.time_from_start
            {
                return Err(AppError::InvalidRequest(format!(
                    "route {}: stop '{}' does not strictly follow '{}'",
                    self.id, next.point_name, prev.point_name
                )));
            }
        }

        Ok(())
    }
}
