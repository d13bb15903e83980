use async_trait::async_trait;
use sqlx::FromRow;

use super::Directory;
use crate::database::Database;
use crate::error::AppResult;
use crate::models::{
    Driver, DriverId, Rider, Route, RouteId, RoutePoint, RoutePointId, UserId, Vehicle, VehicleId,
};

/// Directory backed by the Postgres catalog tables.
#[derive(Clone)]
pub struct PgDirectory {
    db: Database,
}

impl PgDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct RiderRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
}

#[derive(FromRow)]
struct DriverRow {
    id: i64,
    user_id: i64,
    name: String,
    phone: String,
    rating: f64,
}

#[derive(FromRow)]
struct VehicleRow {
    id: i64,
    driver_id: i64,
    registration_number: String,
    brand: String,
    model: String,
    color: String,
    total_seats: i32,
    passenger_seats: i32,
    is_active: bool,
}

#[derive(FromRow)]
struct RouteRow {
    id: i64,
    driver_id: i64,
    route_name: String,
    total_distance: f64,
    estimated_duration: i32,
    is_active: bool,
}

#[derive(FromRow)]
struct RoutePointRow {
    id: i64,
    route_id: i64,
    city: String,
    sub_location: String,
    point_name: String,
    address: String,
    latitude: f64,
    longitude: f64,
    sequence_order: i32,
    distance_from_start: i32,
    time_from_start: i32,
    is_boarding_point: bool,
    is_drop_point: bool,
}

impl From<RoutePointRow> for RoutePoint {
    fn from(row: RoutePointRow) -> Self {
        RoutePoint {
            id: RoutePointId(row.id),
            route_id: RouteId(row.route_id),
            city: row.city,
            sub_location: row.sub_location,
            point_name: row.point_name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            sequence_order: row.sequence_order,
            distance_from_start: row.distance_from_start,
            time_from_start: row.time_from_start,
            is_boarding_point: row.is_boarding_point,
            is_drop_point: row.is_drop_point,
        }
    }
}

const ROUTE_POINT_COLUMNS: &str = "id, route_id, city, sub_location, point_name, address, \
     latitude, longitude, sequence_order, distance_from_start, time_from_start, \
     is_boarding_point, is_drop_point";

#[async_trait]
impl Directory for PgDirectory {
    async fn rider(&self, id: UserId) -> AppResult<Option<Rider>> {
        let row = sqlx::query_as::<_, RiderRow>(
            "SELECT id, name, email, phone FROM users WHERE id = $1 AND is_active = true",
        )
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.map(|r| Rider { id: UserId(r.id), name: r.name, email: r.email, phone: r.phone }))
    }

    async fn driver(&self, id: DriverId) -> AppResult<Option<Driver>> {
        let row = sqlx::query_as::<_, DriverRow>(
            "SELECT d.id, d.user_id, u.name, u.phone, d.rating
             FROM drivers d
             JOIN users u ON u.id = d.user_id
             WHERE d.id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.map(|r| Driver {
            id: DriverId(r.id),
            user_id: UserId(r.user_id),
            name: r.name,
            phone: r.phone,
            rating: r.rating,
        }))
    }

    async fn vehicle(&self, id: VehicleId) -> AppResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            "SELECT id, driver_id, registration_number, brand, model, color,
                    total_seats, passenger_seats, is_active
             FROM vehicles WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.map(|r| Vehicle {
            id: VehicleId(r.id),
            driver_id: DriverId(r.driver_id),
            registration_number: r.registration_number,
            brand: r.brand,
            model: r.model,
            color: r.color,
            total_seats: r.total_seats.max(0) as u32,
            passenger_seats: r.passenger_seats.max(0) as u32,
            is_active: r.is_active,
        }))
    }

    async fn route(&self, id: RouteId) -> AppResult<Option<Route>> {
        let Some(route) = sqlx::query_as::<_, RouteRow>(
            "SELECT id, driver_id, route_name, total_distance, estimated_duration, is_active
             FROM routes WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?
        else {
            return Ok(None);
        };

        let points = sqlx::query_as::<_, RoutePointRow>(&format!(
            "SELECT {} FROM route_points WHERE route_id = $1 ORDER BY sequence_order",
            ROUTE_POINT_COLUMNS
        ))
        .bind(id.0)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(Some(Route {
            id: RouteId(route.id),
            driver_id: DriverId(route.driver_id),
            route_name: route.route_name,
            total_distance: route.total_distance,
            estimated_duration: route.estimated_duration,
            is_active: route.is_active,
            points: points.into_iter().map(RoutePoint::from).collect(),
        }))
    }

    async fn route_point(&self, id: RoutePointId) -> AppResult<Option<RoutePoint>> {
        let row = sqlx::query_as::<_, RoutePointRow>(&format!(
            "SELECT {} FROM route_points WHERE id = $1",
            ROUTE_POINT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.map(RoutePoint::from))
    }
}
