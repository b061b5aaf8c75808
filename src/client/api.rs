use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::store::{BookingStore, StoreAction};
use super::{ClientError, ClientSession};
use crate::models::{Booking, BookingStatus, Ticket, User, Vehicle};
use crate::services::bookings::NewBooking;
use crate::services::payments::CardDetails;

#[derive(Deserialize)]
struct AuthBody {
    token: String,
    user: User,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: Option<String>,
}

/// HTTP client for the booking API. Calls that need a logged-in user take the
/// session explicitly.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, method: Method, path: &str, session: Option<&ClientSession>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{path}", self.base_url));
        match session {
            Some(s) => req.bearer_auth(&s.token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }

        let body: Option<ErrorBody> = res.json().await.ok();
        let (message, code) = match body {
            Some(b) => (b.error, b.code.unwrap_or_default()),
            None => (status.to_string(), String::new()),
        };

        if status == StatusCode::PAYMENT_REQUIRED || code == "payment_declined" {
            return Err(ClientError::Declined(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn authenticate<B: Serialize>(&self, path: &str, body: &B) -> Result<ClientSession, ClientError> {
        let auth: AuthBody = self
            .send(self.request(Method::POST, path, None).json(body))
            .await?;
        Ok(ClientSession {
            token: auth.token,
            user_id: auth.user.id,
            role: auth.user.role,
        })
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<ClientSession, ClientError> {
        let body = serde_json::json!({"name": name, "email": email, "password": password});
        self.authenticate("/api/auth/register", &body).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<ClientSession, ClientError> {
        let body = serde_json::json!({"email": email, "password": password});
        self.authenticate("/api/auth/login", &body).await
    }

    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>, ClientError> {
        self.send(self.request(Method::GET, "/api/vehicles", None)).await
    }

    pub async fn create_booking(&self, session: &ClientSession, req: &NewBooking) -> Result<Booking, ClientError> {
        self.send(self.request(Method::POST, "/api/bookings", Some(session)).json(req))
            .await
    }

    pub async fn list_bookings(&self, session: &ClientSession) -> Result<Vec<Booking>, ClientError> {
        self.send(self.request(Method::GET, "/api/bookings", Some(session)))
            .await
    }

    pub async fn get_booking(&self, session: &ClientSession, id: &str) -> Result<Booking, ClientError> {
        self.send(self.request(Method::GET, &format!("/api/bookings/{id}"), Some(session)))
            .await
    }

    pub async fn set_status(
        &self,
        session: &ClientSession,
        id: &str,
        status: BookingStatus,
    ) -> Result<Booking, ClientError> {
        let body = serde_json::json!({ "status": status });
        self.send(
            self.request(Method::PUT, &format!("/api/bookings/{id}/status"), Some(session))
                .json(&body),
        )
        .await
    }

    pub async fn pay(&self, session: &ClientSession, id: &str, card: &CardDetails) -> Result<Ticket, ClientError> {
        self.send(
            self.request(Method::POST, &format!("/api/bookings/{id}/pay"), Some(session))
                .json(card),
        )
        .await
    }

    /// Ticket for a paid booking, `None` while unpaid.
    pub async fn ticket(&self, session: &ClientSession, id: &str) -> Result<Option<Ticket>, ClientError> {
        let req = self.request(Method::GET, &format!("/api/bookings/{id}/ticket"), Some(session));
        match self.send(req).await {
            Ok(ticket) => Ok(Some(ticket)),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Two-phase status change: the store shows the requested status right
    /// away, then takes the server's answer. On rejection the store is rolled
    /// back and the booking re-fetched so it matches the server again.
    pub async fn transition_optimistic(
        &self,
        session: &ClientSession,
        store: &mut BookingStore,
        id: &str,
        status: BookingStatus,
    ) -> Result<Booking, ClientError> {
        store.apply(StoreAction::Tentative {
            id: id.to_string(),
            status,
        });

        match self.set_status(session, id, status).await {
            Ok(booking) => {
                store.apply(StoreAction::Reconciled(booking.clone()));
                Ok(booking)
            }
            Err(e) => {
                store.apply(StoreAction::Rejected { id: id.to_string() });
                match self.get_booking(session, id).await {
                    Ok(fresh) => store.apply(StoreAction::Reconciled(fresh)),
                    Err(refetch) => {
                        tracing::warn!(booking_id = id, error = %refetch, "refetch after rejected transition failed");
                    }
                }
                Err(e)
            }
        }
    }
}
