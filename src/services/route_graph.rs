//! Read-only segment lookups over a route's ordered stops.

use rust_decimal::Decimal;

use super::fare;
use crate::error::{AppError, AppResult};
use crate::models::{Route, RoutePoint, RoutePointId};

/// The part of a route between a boarding stop and a later drop stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub boarding: RoutePoint,
    pub drop: RoutePoint,
    pub distance_km: Decimal,
    pub duration_minutes: i32,
}

pub struct RouteGraph<'a> {
    route: &'a Route,
}

impl<'a> RouteGraph<'a> {
    pub fn new(route: &'a Route) -> Self {
        Self { route }
    }

    /// Segment between the first boarding stop in `boarding_city` and the
    /// first drop stop in `drop_city` (case-insensitive).
    pub fn segment(&self, boarding_city: &str, drop_city: &str) -> AppResult<Segment> {
        let boarding = self
            .find_city(boarding_city, |p| p.is_boarding_point)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "boarding city '{}' not found on route {}",
                    boarding_city, self.route.id
                ))
            })?;
        let drop = self.find_city(drop_city, |p| p.is_drop_point).ok_or_else(|| {
            AppError::NotFound(format!(
                "drop city '{}' not found on route {}",
                drop_city, self.route.id
            ))
        })?;

        Self::between(boarding, drop)
    }

    /// Segment between two stops given by id. A stop that is not on this
    /// route is `NotFound`; an ineligible or out-of-order stop is `InvalidSegment`.
    pub fn segment_between(
        &self,
        boarding_id: RoutePointId,
        drop_id: RoutePointId,
    ) -> AppResult<Segment> {
        let boarding = self.route.point(boarding_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "boarding point {} is not on route {}",
                boarding_id, self.route.id
            ))
        })?;
        let drop = self.route.point(drop_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "drop point {} is not on route {}",
                drop_id, self.route.id
            ))
        })?;

        if !boarding.is_boarding_point {
            return Err(AppError::InvalidSegment(format!(
                "'{}' is not a boarding point",
                boarding.point_name
            )));
        }
        if !drop.is_drop_point {
            return Err(AppError::InvalidSegment(format!(
                "'{}' is not a drop point",
                drop.point_name
            )));
        }

        Self::between(boarding, drop)
    }

    fn find_city(&self, city: &str, eligible: impl Fn(&RoutePoint) -> bool) -> Option<&'a RoutePoint> {
        let city = city.trim();
        self.route
            .points
            .iter()
            .find(|p| p.city.eq_ignore_ascii_case(city) && eligible(p))
    }

    fn between(boarding: &RoutePoint, drop: &RoutePoint) -> AppResult<Segment> {
        if boarding.sequence_order >= drop.sequence_order {
            return Err(AppError::InvalidSegment(format!(
                "boarding point '{}' must come before drop point '{}'",
                boarding.point_name, drop.point_name
            )));
        }

        Ok(Segment {
            distance_km: fare::segment_distance_km(boarding, drop),
            duration_minutes: drop.time_from_start - boarding.time_from_start,
            boarding: boarding.clone(),
            drop: drop.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DriverId, RouteId};
    use rust_decimal_macros::dec;

    fn stop(id: i64, seq: i32, city: &str, meters: i32, minutes: i32) -> RoutePoint {
        RoutePoint {
            id: RoutePointId(id),
            route_id: RouteId(7),
            city: city.to_string(),
            sub_location: "Center".to_string(),
            point_name: RoutePoint::display_name(city, "Center"),
            address: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            sequence_order: seq,
            distance_from_start: meters,
            time_from_start: minutes,
            is_boarding_point: true,
            is_drop_point: true,
        }
    }

    fn route() -> Route {
        Route {
            id: RouteId(7),
            driver_id: DriverId(1),
            route_name: "Pune to Mumbai".to_string(),
            total_distance: 150.0,
            estimated_duration: 180,
            is_active: true,
            points: vec![
                stop(1, 1, "Pune", 0, 0),
                stop(2, 2, "Lonavala", 65_500, 70),
                stop(3, 3, "Mumbai", 150_000, 180),
            ],
        }
    }

    #[test]
    fn segment_by_city_uses_offset_differences() {
        let route = route();
        let segment = RouteGraph::new(&route).segment("Lonavala", "mumbai").unwrap();

        assert_eq!(segment.distance_km, dec!(84.5));
        assert_eq!(segment.duration_minutes, 110);
        assert_eq!(segment.boarding.id, RoutePointId(2));
        assert_eq!(segment.drop.id, RoutePointId(3));
    }

    #[test]
    fn reversed_or_identical_legs_are_invalid() {
        let route = route();
        let graph = RouteGraph::new(&route);

        assert!(matches!(graph.segment("Mumbai", "Pune"), Err(AppError::InvalidSegment(_))));
        assert!(matches!(
            graph.segment_between(RoutePointId(2), RoutePointId(2)),
            Err(AppError::InvalidSegment(_))
        ));
    }

    #[test]
    fn missing_city_is_not_found() {
        let route = route();
        assert!(matches!(
            RouteGraph::new(&route).segment("Pune", "Goa"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn ineligible_points_are_invalid() {
        let mut route = route();
        route.points[0].is_boarding_point = false;
        route.points[1].is_drop_point = false;
        let graph = RouteGraph::new(&route);

        assert!(matches!(
            graph.segment_between(RoutePointId(1), RoutePointId(3)),
            Err(AppError::InvalidSegment(_))
        ));
        assert!(matches!(
            graph.segment_between(RoutePointId(2), RoutePointId(2)),
            Err(AppError::InvalidSegment(_))
        ));
        assert!(graph.segment_between(RoutePointId(2), RoutePointId(3)).is_ok());
    }

    #[test]
    fn points_off_the_route_are_not_found() {
        let route = route();
        let graph = RouteGraph::new(&route);

        assert!(matches!(
            graph.segment_between(RoutePointId(2), RoutePointId(99)),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            graph.segment_between(RoutePointId(51), RoutePointId(3)),
            Err(AppError::NotFound(_))
        ));
    }
}
