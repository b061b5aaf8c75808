use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::db::queries;
use crate::models::Notification;

pub const KIND_BOOKING_CREATED: &str = "booking_created";
pub const KIND_BOOKING_STATUS: &str = "booking_status";
pub const KIND_PAYMENT_COMPLETED: &str = "payment_completed";

/// Persists a notification for `user_id` and pushes it to live subscribers.
/// Failures are logged and swallowed; a missed notification never fails the
/// request that triggered it.
pub fn notify(
    conn: &Connection,
    tx: &broadcast::Sender<Notification>,
    user_id: &str,
    kind: &str,
    message: &str,
) {
    match queries::insert_notification(conn, user_id, kind, message) {
        Ok(notification) => {
            // No receivers is fine
            let _ = tx.send(notification);
        }
        Err(e) => {
            tracing::error!(error = %e, user_id, kind, "failed to record notification");
        }
    }
}
