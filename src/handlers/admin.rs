use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries::{self, DashboardStats};
use crate::errors::AppError;
use crate::handlers::require_admin;
use crate::models::{Booking, BookingStatus, Payment, User, UserStatus, Vehicle, VehicleStatus};
use crate::services::bookings;
use crate::services::catalog::{self, NewVehicle, VehiclePatch};
use crate::state::AppState;

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    require_admin(&state, &headers)?;
    let db = state.db();
    Ok(Json(queries::get_dashboard_stats(&db)?))
}

// GET /api/admin/users
pub async fn get_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    require_admin(&state, &headers)?;
    let db = state.db();
    Ok(Json(queries::list_users(&db)?))
}

fn set_user_status(
    state: &AppState,
    headers: &HeaderMap,
    user_id: &str,
    status: UserStatus,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_admin(state, headers)?;
    if session.user_id == user_id && status == UserStatus::Blocked {
        return Err(AppError::Validation("you cannot block your own account".to_string()));
    }

    let db = state.db();
    if !queries::set_user_status(&db, user_id, status)? {
        return Err(AppError::NotFound("user not found".to_string()));
    }

    tracing::info!(user_id, status = status.as_str(), actor = %session.user_id, "user status changed");
    Ok(Json(serde_json::json!({"ok": true, "status": status})))
}

// POST /api/admin/users/:id/block
pub async fn block_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    set_user_status(&state, &headers, &id, UserStatus::Blocked)
}

// POST /api/admin/users/:id/unblock
pub async fn unblock_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    set_user_status(&state, &headers, &id, UserStatus::Active)
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_admin(&state, &headers)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let db = state.db();
    Ok(Json(queries::get_all_bookings(&db, query.status, limit)?))
}

// PUT /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct BookingStatusRequest {
    pub status: BookingStatus,
}

pub async fn set_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BookingStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let session = require_admin(&state, &headers)?;
    let booking = bookings::transition_booking(&state, &session, &id, body.status)?;
    Ok(Json(booking))
}

// GET /api/admin/payments
#[derive(Deserialize)]
pub struct PaymentsQuery {
    pub limit: Option<i64>,
}

pub async fn get_payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    require_admin(&state, &headers)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let db = state.db();
    Ok(Json(queries::list_payments(&db, limit)?))
}

// POST /api/admin/vehicles
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewVehicle>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    require_admin(&state, &headers)?;
    let vehicle = catalog::new_vehicle(body)?;

    let db = state.db();
    queries::create_vehicle(&db, &vehicle)?;
    tracing::info!(vehicle_id = %vehicle.id, label = %vehicle.label(), "vehicle added to fleet");

    Ok((StatusCode::CREATED, Json(vehicle)))
}

// PUT /api/admin/vehicles/:id
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<VehiclePatch>,
) -> Result<Json<Vehicle>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db();
    let existing = queries::get_vehicle(&db, &id)?
        .ok_or_else(|| AppError::NotFound("vehicle not found".to_string()))?;
    let vehicle = catalog::apply_patch(existing, body)?;
    queries::update_vehicle(&db, &vehicle)?;

    tracing::info!(vehicle_id = %vehicle.id, "vehicle updated");
    let updated = queries::get_vehicle(&db, &id)?
        .ok_or_else(|| AppError::NotFound("vehicle not found".to_string()))?;
    Ok(Json(updated))
}

// PUT /api/admin/vehicles/:id/status
#[derive(Deserialize)]
pub struct VehicleStatusRequest {
    pub status: VehicleStatus,
}

pub async fn set_vehicle_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<VehicleStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db();
    if !queries::set_vehicle_status(&db, &id, body.status)? {
        return Err(AppError::NotFound("vehicle not found".to_string()));
    }

    tracing::info!(vehicle_id = %id, status = body.status.as_str(), "vehicle status changed");
    Ok(Json(serde_json::json!({"ok": true, "status": body.status})))
}

// DELETE /api/admin/vehicles/:id
pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db();
    if queries::count_bookings_for_vehicle(&db, &id)? > 0 {
        return Err(AppError::Conflict(
            "vehicle has bookings; mark it UNAVAILABLE instead".to_string(),
        ));
    }
    if !queries::delete_vehicle(&db, &id)? {
        return Err(AppError::NotFound("vehicle not found".to_string()));
    }

    tracing::info!(vehicle_id = %id, "vehicle removed from fleet");
    Ok(StatusCode::NO_CONTENT)
}
