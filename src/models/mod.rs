pub mod booking;
pub mod notification;
pub mod payment;
pub mod review;
pub mod ticket;
pub mod user;
pub mod vehicle;

pub use booking::{Booking, BookingStatus};
pub use notification::Notification;
pub use payment::{Payment, PaymentStatus};
pub use review::Review;
pub use ticket::Ticket;
pub use user::{Role, User, UserStatus};
pub use vehicle::{Vehicle, VehicleStatus};

/// Returned when a stored or submitted status string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
