//! Data models for the lending library

pub mod patron;
pub mod reservation;
pub mod title;

// Re-export commonly used types
pub use patron::{NewPatron, Patron};
pub use reservation::{Reservation, ReservationRequest};
pub use title::{NewTitle, Title};
