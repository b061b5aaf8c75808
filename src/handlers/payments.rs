use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_session;
use crate::models::Ticket;
use crate::services::auth::Session;
use crate::services::payments::{self, CardDetails};
use crate::services::ticket;
use crate::state::AppState;

// POST /api/bookings/:id/pay
pub async fn pay(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(card): Json<CardDetails>,
) -> Result<Json<Ticket>, AppError> {
    let session = require_session(&state, &headers)?;
    let ticket = payments::process_payment(&state, &session, &id, &card).await?;
    Ok(Json(ticket))
}

fn load_ticket(state: &AppState, session: &Session, booking_id: &str) -> Result<Ticket, AppError> {
    let db = state.db();
    let booking = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    if !session.can_access(&booking.user_id) {
        return Err(AppError::Forbidden("not your booking".to_string()));
    }
    queries::get_ticket(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound("no ticket for this booking".to_string()))
}

// GET /api/bookings/:id/ticket
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, AppError> {
    let session = require_session(&state, &headers)?;
    Ok(Json(load_ticket(&state, &session, &id)?))
}

// GET /api/bookings/:id/ticket/print
pub async fn print_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let session = require_session(&state, &headers)?;
    let ticket = load_ticket(&state, &session, &id)?;
    Ok(Html(ticket::render_print_html(&ticket)))
}

// GET /api/bookings/:id/ticket.txt
pub async fn download_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = require_session(&state, &headers)?;
    let ticket = load_ticket(&state, &session, &id)?;
    let filename = format!("ticket-{}.txt", ticket.transaction_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ticket::render_text(&ticket),
    )
        .into_response())
}
