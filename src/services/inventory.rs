//! Seat pool of a single trip.
//!
//! The pool is an arena of seats addressed by label. It holds no lock of its
//! own: every mutation goes through `&mut self`, and the ledger only hands out
//! `&mut SeatInventory` while the owning trip's mutex is held. That mutex is
//! the per-trip serialization point, so `reserve` checking and marking all
//! requested seats in one call is atomic with respect to every other booking
//! on the same trip.

use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::{Seat, DRIVER_SEAT_LABEL};

#[derive(Debug, Clone)]
pub struct SeatInventory {
    seats: Vec<Seat>,
    index: HashMap<String, usize>,
}

impl SeatInventory {
    /// Builds the pool for a new trip: the driver seat followed by `S1..Sn`.
    pub fn for_trip(passenger_seats: u32) -> Self {
        let mut seats = Vec::with_capacity(passenger_seats as usize + 1);
        seats.push(Seat::driver());
        seats.extend((1..=passenger_seats).map(Seat::passenger));
        Self::from_seats(seats)
    }

    /// Rebuilds a pool from stored seats, keeping their order.
    pub fn from_seats(seats: Vec<Seat>) -> Self {
        let index = seats
            .iter()
            .enumerate()
            .map(|(i, seat)| (seat.label.clone(), i))
            .collect();

        Self { seats, index }
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn get(&self, label: &str) -> Option<&Seat> {
        self.index.get(label).map(|&i| &self.seats[i])
    }

    pub fn passenger_count(&self) -> u32 {
        self.seats.iter().filter(|s| !s.is_driver_seat).count() as u32
    }

    pub fn available_count(&self) -> u32 {
        self.seats.iter().filter(|s| !s.is_driver_seat && s.is_available).count() as u32
    }

    /// Verifies that every requested seat could be reserved right now.
    ///
    /// Reports the first offending label: unknown seats, the driver seat and
    /// seats already held all fail with `Conflict`.
    pub fn ensure_reservable(&self, labels: &[String]) -> AppResult<()> {
        for label in labels {
            match self.get(label) {
                None => {
                    return Err(AppError::Conflict(format!("seat {} does not exist on this trip", label)))
                }
                Some(seat) if seat.is_driver_seat => {
                    return Err(AppError::Conflict(format!(
                        "seat {} is the driver seat and cannot be booked",
                        DRIVER_SEAT_LABEL
                    )))
                }
                Some(seat) if !seat.is_available => {
                    return Err(AppError::Conflict(format!("seat {} is already booked", label)))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// All-or-nothing reservation: either every seat becomes unavailable or
    /// none changes.
    pub fn reserve(&mut self, labels: &[String]) -> AppResult<()> {
        self.ensure_reservable(labels)?;
        for label in labels {
            let i = self.index[label.as_str()];
            self.seats[i].is_available = false;
        }
        Ok(())
    }

    /// Marks the seats available again and returns how many actually changed.
    ///
    /// Seats that are already available, unknown, or the driver seat are
    /// skipped, so releasing twice is harmless.
    pub fn release(&mut self, labels: &[String]) -> u32 {
        let mut released = 0;
        for label in labels {
            if let Some(&i) = self.index.get(label.as_str()) {
                let seat = &mut self.seats[i];
                if !seat.is_driver_seat && !seat.is_available {
                    seat.is_available = true;
                    released += 1;
                }
            }
        }
        released
    }
}
