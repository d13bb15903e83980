pub mod booking;
pub mod fare;
pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod payment;
pub mod route_graph;
pub mod trips;

pub use booking::BookingEngine;
pub use gateway::{PaymentGateway, SimulatedGateway};
pub use inventory::SeatInventory;
pub use ledger::Ledger;
pub use payment::{PaymentCoordinator, PaymentSettings};
pub use route_graph::{RouteGraph, Segment};
pub use trips::{TripSearch, TripService};
