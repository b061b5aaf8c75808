pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod vehicles;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::services::auth::{resolve_session, Session};
use crate::state::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let db = state.db();
    resolve_session(&db, &state.config, token)
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let session = require_session(state, headers)?;
    if !session.is_admin() {
        return Err(AppError::Forbidden("administrator access required".to_string()));
    }
    Ok(session)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // catalog
        .route("/api/vehicles", get(vehicles::list_vehicles))
        .route("/api/vehicles/:id", get(vehicles::get_vehicle))
        .route(
            "/api/vehicles/:id/reviews",
            get(vehicles::list_reviews).post(vehicles::create_review),
        )
        // bookings
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/:id/status", put(bookings::update_status))
        .route("/api/bookings/:id/pay", post(payments::pay))
        .route("/api/bookings/:id/ticket", get(payments::get_ticket))
        .route("/api/bookings/:id/ticket/print", get(payments::print_ticket))
        .route("/api/bookings/:id/ticket.txt", get(payments::download_ticket))
        // notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/events", get(notifications::events_stream))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        // admin
        .route("/api/admin/stats", get(admin::get_stats))
        .route("/api/admin/users", get(admin::get_users))
        .route("/api/admin/users/:id/block", post(admin::block_user))
        .route("/api/admin/users/:id/unblock", post(admin::unblock_user))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route("/api/admin/bookings/:id/status", put(admin::set_booking_status))
        .route("/api/admin/payments", get(admin::get_payments))
        .route("/api/admin/vehicles", post(admin::create_vehicle))
        .route(
            "/api/admin/vehicles/:id",
            put(admin::update_vehicle).delete(admin::delete_vehicle),
        )
        .route("/api/admin/vehicles/:id/status", put(admin::set_vehicle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
