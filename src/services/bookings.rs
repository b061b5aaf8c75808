use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, UserStatus, VehicleStatus};
use crate::services::auth::Session;
use crate::services::lifecycle;
use crate::services::notifications::{self, KIND_BOOKING_CREATED, KIND_BOOKING_STATUS};
use crate::services::pricing;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub vehicle_id: String,
    pub start_date: String,
    pub end_date: String,
    pub notes: Option<String>,
}

pub fn create_booking(state: &AppState, session: &Session, req: &NewBooking) -> Result<Booking, AppError> {
    let start = pricing::parse_date(&req.start_date).map_err(|e| AppError::Validation(e.to_string()))?;
    let end = pricing::parse_date(&req.end_date).map_err(|e| AppError::Validation(e.to_string()))?;

    let db = state.db();

    let user = queries::get_user_by_id(&db, &session.user_id)?.ok_or(AppError::Unauthorized)?;
    if user.status != UserStatus::Active {
        return Err(AppError::Forbidden("account is blocked".to_string()));
    }

    let vehicle = queries::get_vehicle(&db, &req.vehicle_id)?
        .ok_or_else(|| AppError::NotFound("vehicle not found".to_string()))?;
    if vehicle.status != VehicleStatus::Available {
        return Err(AppError::Conflict(format!(
            "vehicle is {}",
            vehicle.status.as_str()
        )));
    }

    let quote = pricing::quote(start, end, vehicle.daily_rate).map_err(|e| AppError::Validation(e.to_string()))?;

    let overlapping = queries::find_overlapping_bookings(&db, &vehicle.id, &start, &end)?;
    if let Some(existing) = overlapping.first() {
        return Err(AppError::Conflict(format!(
            "vehicle is already booked from {} to {}",
            existing.start_date, existing.end_date
        )));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        vehicle_id: vehicle.id.clone(),
        start_date: start,
        end_date: end,
        total_days: quote.total_days,
        total_price: quote.total_price,
        status: BookingStatus::Pending,
        payment_status: None,
        notes: req.notes.clone().filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(&db, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        vehicle_id = %booking.vehicle_id,
        total_price = booking.total_price,
        "booking created"
    );
    notifications::notify(
        &db,
        &state.notify_tx,
        &booking.user_id,
        KIND_BOOKING_CREATED,
        &format!("Booking for {} from {} to {} is pending", vehicle.label(), start, end),
    );

    Ok(booking)
}

/// Fetches a booking the session is allowed to see.
pub fn get_booking(state: &AppState, session: &Session, booking_id: &str) -> Result<Booking, AppError> {
    let db = state.db();
    let booking = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    if !session.can_access(&booking.user_id) {
        return Err(AppError::Forbidden("not your booking".to_string()));
    }
    Ok(booking)
}

/// Moves a booking along the status machine on behalf of `session`. A
/// rejected transition leaves the stored status unchanged.
pub fn transition_booking(
    state: &AppState,
    session: &Session,
    booking_id: &str,
    requested: BookingStatus,
) -> Result<Booking, AppError> {
    let db = state.db();
    let booking = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    if !session.can_access(&booking.user_id) {
        return Err(AppError::Forbidden("not your booking".to_string()));
    }

    let updated = lifecycle::apply(&booking, requested, session.role).map_err(|e| {
        tracing::info!(booking_id, error = %e, "booking transition rejected");
        match e {
            lifecycle::TransitionError::AdminOnly { .. } => AppError::Forbidden(e.to_string()),
            lifecycle::TransitionError::NotAllowed { .. } => AppError::Conflict(e.to_string()),
        }
    })?;

    // A reset makes the booking live again; its dates may have been taken since
    if updated.status == BookingStatus::Pending {
        let clash = queries::find_overlapping_bookings(
            &db,
            &booking.vehicle_id,
            &booking.start_date,
            &booking.end_date,
        )?
        .into_iter()
        .find(|other| other.id != booking.id);
        if let Some(other) = clash {
            tracing::info!(booking_id, clashes_with = %other.id, "booking reset rejected");
            return Err(AppError::Conflict(format!(
                "vehicle is already booked from {} to {}",
                other.start_date, other.end_date
            )));
        }
    }

    if !queries::update_booking_status(&db, booking_id, updated.status)? {
        return Err(AppError::NotFound("booking not found".to_string()));
    }

    tracing::info!(
        booking_id,
        from = %booking.status,
        to = %updated.status,
        actor = %session.user_id,
        "booking status changed"
    );
    notifications::notify(
        &db,
        &state.notify_tx,
        &booking.user_id,
        KIND_BOOKING_STATUS,
        &format!("Booking {} is now {}", booking.id, updated.status),
    );

    queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}
