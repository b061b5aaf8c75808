use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_session;
use crate::models::{Role, User, UserStatus};
use crate::services::auth::{self, Registration};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

fn issue(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let token = auth::issue_token(
        &state.config.session_secret,
        &user.id,
        Utc::now(),
        state.config.session_ttl_hours,
    )
    .map_err(|e| AppError::Internal(e.into()))?;
    Ok(AuthResponse { token, user })
}

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let reg = Registration {
        name: body.name,
        email: body.email,
        password: body.password,
        phone: body.phone,
    };
    auth::validate_registration(&reg)?;

    let password = reg.password.clone();
    let cost = state.config.bcrypt_cost;
    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let user = {
        let db = state.db();
        auth::create_account(&db, &reg, hash, Role::User, Utc::now().naive_utc())?
    };

    Ok((StatusCode::CREATED, Json(issue(&state, user)?)))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = {
        let db = state.db();
        queries::get_user_by_email(&db, body.email.trim())?
    };
    let Some(user) = user else {
        return Err(AppError::Unauthorized);
    };

    let hash = user.password_hash.clone();
    let password = body.password;
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        tracing::info!(user_id = %user.id, "login failed");
        return Err(AppError::Unauthorized);
    }
    if user.status == UserStatus::Blocked {
        return Err(AppError::Forbidden("account is blocked".to_string()));
    }

    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(issue(&state, user)?))
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let session = require_session(&state, &headers)?;
    let db = state.db();
    let user = queries::get_user_by_id(&db, &session.user_id)?.ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}
