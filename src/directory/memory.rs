use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::Directory;
use crate::error::AppResult;
use crate::models::{
    Driver, DriverId, Rider, Route, RouteId, RoutePoint, RoutePointId, UserId, Vehicle, VehicleId,
};

/// Directory held in memory; used for tests and embedded setups.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    riders: RwLock<HashMap<UserId, Rider>>,
    drivers: RwLock<HashMap<DriverId, Driver>>,
    vehicles: RwLock<HashMap<VehicleId, Vehicle>>,
    routes: RwLock<HashMap<RouteId, Route>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_rider(&self, rider: Rider) {
        self.riders.write().unwrap_or_else(PoisonError::into_inner).insert(rider.id, rider);
    }

    pub fn insert_driver(&self, driver: Driver) {
        self.drivers.write().unwrap_or_else(PoisonError::into_inner).insert(driver.id, driver);
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.write().unwrap_or_else(PoisonError::into_inner).insert(vehicle.id, vehicle);
    }

    pub fn remove_vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.write().unwrap_or_else(PoisonError::into_inner).remove(&id)
    }

    /// Stores the route with its stops sorted by sequence.
    pub fn insert_route(&self, mut route: Route) {
        route.points.sort_by_key(|p| p.sequence_order);
        self.routes.write().unwrap_or_else(PoisonError::into_inner).insert(route.id, route);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn rider(&self, id: UserId) -> AppResult<Option<Rider>> {
        Ok(self.riders.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned())
    }

    async fn driver(&self, id: DriverId) -> AppResult<Option<Driver>> {
        Ok(self.drivers.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned())
    }

    async fn vehicle(&self, id: VehicleId) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned())
    }

    async fn route(&self, id: RouteId) -> AppResult<Option<Route>> {
        Ok(self.routes.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned())
    }

    async fn route_point(&self, id: RoutePointId) -> AppResult<Option<RoutePoint>> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(routes.values().flat_map(|r| r.points.iter()).find(|p| p.id == id).cloned())
    }
}
