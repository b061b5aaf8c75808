use std::sync::{Arc, Mutex};

use axum::http::HeaderValue;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use rentbook::config::AppConfig;
use rentbook::db;
use rentbook::handlers;
use rentbook::services::auth;
use rentbook::services::payments::SimulatedGateway;
use rentbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.session_secret == "changeme" {
        tracing::warn!("SESSION_SECRET is not set, using the insecure default");
    }

    let conn = db::init_db(&config.database_url)?;
    auth::ensure_admin(&conn, &config)?;

    let (notify_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(SimulatedGateway),
        notify_tx,
    });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    let app = handlers::router(state).layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(currency = %config.currency, "starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
