pub mod booking;
pub mod directory;
pub mod ids;
pub mod payment;
pub mod route;
pub mod seat;
pub mod trip;

pub use booking::{Booking, BookingStatus, BookingView, NewBooking};
pub use directory::{Driver, Rider, Vehicle};
pub use ids::{BookingId, DriverId, PaymentId, RouteId, RoutePointId, TripId, UserId, VehicleId};
pub use payment::{Payment, PaymentStatus};
pub use route::{Route, RoutePoint};
pub use seat::{Seat, SeatAvailability, DRIVER_SEAT_LABEL};
pub use trip::{NewTrip, Trip, TripSearchResult, TripStatus};
