//! Typed client for the booking API plus the local store a front end keeps
//! its optimistic view in.

pub mod api;
pub mod store;

pub use api::ApiClient;
pub use store::{BookingStore, StoreAction};

use crate::models::Role;

/// Credentials for one logged-in user, passed to every authenticated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment declined: {0}")]
    Declined(String),

    #[error("api error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}
