use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_session;
use crate::models::{Booking, BookingStatus};
use crate::services::bookings::{self, NewBooking};
use crate::state::AppState;

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let session = require_session(&state, &headers)?;
    let db = state.db();
    Ok(Json(queries::get_bookings_for_user(&db, &session.user_id)?))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let session = require_session(&state, &headers)?;
    let booking = bookings::create_booking(&state, &session, &body)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let session = require_session(&state, &headers)?;
    Ok(Json(bookings::get_booking(&state, &session, &id)?))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let session = require_session(&state, &headers)?;
    let booking = bookings::transition_booking(&state, &session, &id, BookingStatus::Cancelled)?;
    Ok(Json(booking))
}

// PUT /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let session = require_session(&state, &headers)?;
    let booking = bookings::transition_booking(&state, &session, &id, body.status)?;
    Ok(Json(booking))
}
