//! Lookup interfaces for the collaborators the booking core does not own:
//! riders, drivers, vehicles and the route catalog.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Driver, DriverId, Rider, Route, RouteId, RoutePoint, RoutePointId, UserId, Vehicle, VehicleId,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PgDirectory;

/// Read-only existence lookups. `Ok(None)` means the record does not exist;
/// `Err` is reserved for infrastructure failures.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn rider(&self, id: UserId) -> AppResult<Option<Rider>>;

    async fn driver(&self, id: DriverId) -> AppResult<Option<Driver>>;

    async fn vehicle(&self, id: VehicleId) -> AppResult<Option<Vehicle>>;

    /// Route with its stops ordered by sequence.
    async fn route(&self, id: RouteId) -> AppResult<Option<Route>>;

    async fn route_point(&self, id: RoutePointId) -> AppResult<Option<RoutePoint>>;
}
