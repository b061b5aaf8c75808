use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha1::Sha1;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User, UserStatus};

type HmacSha1 = Hmac<Sha1>;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Authenticated caller of a request. Built from the bearer token on every
/// request and handed explicitly to whatever needs to know who is acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins can act on anything; users only on their own rows.
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("session secret rejected by hmac")]
    InvalidKey,
}

fn sign(secret: &str, payload: &[u8]) -> Result<HmacSha1, TokenError> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidKey)?;
    mac.update(payload);
    Ok(mac)
}

/// Token layout: `base64url(user_id|expires_at).base64url(hmac_sha1(payload))`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    now: DateTime<Utc>,
    ttl_hours: i64,
) -> Result<String, TokenError> {
    let expires_at = (now + Duration::hours(ttl_hours)).timestamp();
    let payload = format!("{user_id}|{expires_at}");
    let signature = sign(secret, payload.as_bytes())?.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed)?;

    sign(secret, &payload)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;
    let (user_id, expires_at) = payload.rsplit_once('|').ok_or(TokenError::Malformed)?;
    let expires_at: i64 = expires_at.parse().map_err(|_| TokenError::Malformed)?;

    if expires_at <= now.timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(TokenClaims {
        user_id: user_id.to_string(),
        expires_at,
    })
}

pub fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Resolves a bearer token into a session. The role always comes from the
/// stored user, and blocked users are turned away.
pub fn resolve_session(conn: &Connection, config: &AppConfig, token: &str) -> Result<Session, AppError> {
    let claims = verify_token(&config.session_secret, token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AppError::Unauthorized
    })?;

    let user = queries::get_user_by_id(conn, &claims.user_id)?.ok_or(AppError::Unauthorized)?;
    if user.status == UserStatus::Blocked {
        return Err(AppError::Forbidden("account is blocked".to_string()));
    }

    Ok(Session {
        user_id: user.id,
        role: user.role,
    })
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

pub fn validate_registration(reg: &Registration) -> Result<(), AppError> {
    if reg.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    let email = reg.email.trim();
    let valid_email = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid_email {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if reg.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Inserts a new user whose password has already been hashed.
pub fn create_account(
    conn: &Connection,
    reg: &Registration,
    password_hash: String,
    role: Role,
    now: NaiveDateTime,
) -> Result<User, AppError> {
    let email = reg.email.trim().to_lowercase();
    if queries::get_user_by_email(conn, &email)?.is_some() {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: reg.name.trim().to_string(),
        email,
        phone: reg.phone.clone().filter(|p| !p.trim().is_empty()),
        password_hash,
        role,
        status: UserStatus::Active,
        created_at: now,
    };
    queries::create_user(conn, &user)?;

    tracing::info!(user_id = %user.id, role = %user.role, "account created");
    Ok(user)
}

/// Makes sure the configured admin account exists. Does nothing when no
/// admin credentials are configured or the email is already taken.
pub fn ensure_admin(conn: &Connection, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    if queries::get_user_by_email(conn, email)?.is_some() {
        return Ok(());
    }

    let reg = Registration {
        name: "Administrator".to_string(),
        email: email.clone(),
        password: password.clone(),
        phone: None,
    };
    let hash = hash_password(password, config.bcrypt_cost)?;
    create_account(conn, &reg, hash, Role::Admin, Utc::now().naive_utc())
        .map_err(|e| anyhow::anyhow!("failed to seed admin: {e}"))?;
    Ok(())
}
