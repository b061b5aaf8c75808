use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub currency: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "rentbook.db".to_string()),
            session_secret: env::var("SESSION_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(bcrypt::DEFAULT_COST),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
        }
    }
}
