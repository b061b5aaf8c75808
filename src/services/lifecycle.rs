//! Booking status machine.
//!
//! ```text
//! PENDING   -> CONFIRMED | CANCELLED
//! CONFIRMED -> COMPLETED | CANCELLED
//! CANCELLED -> PENDING            (admin reset)
//! COMPLETED -> (terminal)
//! ```
//!
//! Admins may take any edge. Everyone else may only cancel a PENDING or
//! CONFIRMED booking; ownership is checked by the caller.

use chrono::Utc;

use crate::models::{Booking, BookingStatus, Role};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move booking from {from} to {to}")]
    NotAllowed { from: BookingStatus, to: BookingStatus },

    #[error("only an administrator can move a booking from {from} to {to}")]
    AdminOnly { from: BookingStatus, to: BookingStatus },
}

pub fn allowed_targets(current: BookingStatus, role: Role) -> &'static [BookingStatus] {
    use BookingStatus::*;

    match (role, current) {
        (Role::Admin, Pending) => &[Confirmed, Cancelled],
        (Role::Admin, Confirmed) => &[Completed, Cancelled],
        (Role::Admin, Cancelled) => &[Pending],
        (Role::User, Pending | Confirmed) => &[Cancelled],
        (_, _) => &[],
    }
}

pub fn transition(
    current: BookingStatus,
    requested: BookingStatus,
    role: Role,
) -> Result<BookingStatus, TransitionError> {
    if allowed_targets(current, role).contains(&requested) {
        return Ok(requested);
    }

    if allowed_targets(current, Role::Admin).contains(&requested) {
        Err(TransitionError::AdminOnly {
            from: current,
            to: requested,
        })
    } else {
        Err(TransitionError::NotAllowed {
            from: current,
            to: requested,
        })
    }
}

/// Applies a transition to a booking, returning the updated copy. The input
/// is left untouched when the transition is rejected.
pub fn apply(booking: &Booking, requested: BookingStatus, role: Role) -> Result<Booking, TransitionError> {
    let status = transition(booking.status, requested, role)?;
    Ok(Booking {
        status,
        updated_at: Utc::now().naive_utc(),
        ..booking.clone()
    })
}
