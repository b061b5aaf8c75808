use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::Notification;
use crate::services::payments::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub gateway: Box<dyn PaymentGateway>,
    pub notify_tx: broadcast::Sender<Notification>,
}

impl AppState {
    /// Locks the shared connection, recovering the guard if a previous holder panicked.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
