use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::broadcast;
use tower::ServiceExt;

use rentbook::client::{ApiClient, BookingStore, ClientError, StoreAction};
use rentbook::config::AppConfig;
use rentbook::db;
use rentbook::db::queries;
use rentbook::handlers;
use rentbook::models::{BookingStatus, Role, VehicleStatus};
use rentbook::services::auth::{self, Registration};
use rentbook::services::bookings::NewBooking;
use rentbook::services::catalog::{self, NewVehicle};
use rentbook::services::payments::{
    CardDetails, ChargeOutcome, PaymentGateway, SimulatedGateway, ValidatedCard,
};
use rentbook::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        session_secret: "test-secret".to_string(),
        session_ttl_hours: 1,
        bcrypt_cost: 4,
        currency: "USD".to_string(),
        admin_email: Some("admin@example.com".to_string()),
        admin_password: Some("admin-password".to_string()),
        cors_origin: None,
    }
}

fn test_state() -> Arc<AppState> {
    test_state_with_gateway(|_| Box::new(SimulatedGateway))
}

/// Builds state around a gateway that may share the database connection.
fn test_state_with_gateway(
    gateway: impl FnOnce(Arc<Mutex<Connection>>) -> Box<dyn PaymentGateway>,
) -> Arc<AppState> {
    let config = test_config();
    let conn = db::init_db(":memory:").unwrap();
    auth::ensure_admin(&conn, &config).unwrap();
    let db = Arc::new(Mutex::new(conn));
    let (notify_tx, _) = broadcast::channel(64);
    Arc::new(AppState {
        gateway: gateway(db.clone()),
        db,
        config,
        notify_tx,
    })
}

/// Approves like the simulator, but cancels every CONFIRMED booking while
/// the charge is in flight.
struct CancellingGateway {
    db: Arc<Mutex<Connection>>,
}

#[async_trait::async_trait]
impl PaymentGateway for CancellingGateway {
    async fn charge(
        &self,
        card: &ValidatedCard,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<ChargeOutcome> {
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE bookings SET status = 'CANCELLED' WHERE status = 'CONFIRMED'",
                [],
            )?;
        }
        SimulatedGateway.charge(card, amount, currency).await
    }
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

/// Creates an account directly and returns (user_id, bearer token).
fn seed_user(state: &AppState, email: &str, role: Role) -> (String, String) {
    let reg = Registration {
        name: email.split('@').next().unwrap().to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        phone: None,
    };
    let hash = auth::hash_password(&reg.password, 4).unwrap();
    let user = {
        let db = state.db();
        auth::create_account(&db, &reg, hash, role, Utc::now().naive_utc()).unwrap()
    };
    let token = auth::issue_token(&state.config.session_secret, &user.id, Utc::now(), 1).unwrap();
    (user.id, token)
}

fn admin_token(state: &AppState) -> String {
    let db = state.db();
    let admin = queries::get_user_by_email(&db, "admin@example.com").unwrap().unwrap();
    auth::issue_token(&state.config.session_secret, &admin.id, Utc::now(), 1).unwrap()
}

fn seed_vehicle(state: &AppState, daily_rate: i64) -> String {
    let vehicle = catalog::new_vehicle(NewVehicle {
        brand: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: 2022,
        category: "Sedan".to_string(),
        daily_rate,
        seats: Some(5),
        image_url: None,
        description: None,
        status: None,
    })
    .unwrap();
    let db = state.db();
    queries::create_vehicle(&db, &vehicle).unwrap();
    vehicle.id
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn create_booking(
    state: &Arc<AppState>,
    token: &str,
    vehicle_id: &str,
    start: &str,
    end: &str,
) -> (StatusCode, serde_json::Value) {
    send(
        state,
        request(
            "POST",
            "/api/bookings",
            Some(token),
            Some(serde_json::json!({
                "vehicle_id": vehicle_id,
                "start_date": start,
                "end_date": end,
            })),
        ),
    )
    .await
}

async fn admin_set_status(state: &Arc<AppState>, booking_id: &str, status: &str) -> StatusCode {
    let token = admin_token(state);
    let (code, _) = send(
        state,
        request(
            "PUT",
            &format!("/api/admin/bookings/{booking_id}/status"),
            Some(&token),
            Some(serde_json::json!({ "status": status })),
        ),
    )
    .await;
    code
}

fn card(number: &str) -> serde_json::Value {
    serde_json::json!({
        "card_number": number,
        "card_holder": "Alice Doe",
        "expiry": "12/27",
        "cvv": "123",
    })
}

/// A CONFIRMED booking for 2024-06-01..2024-06-04 at 25000/day.
async fn confirmed_booking(state: &Arc<AppState>) -> (String, String) {
    let (_, token) = seed_user(state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(state, 25000);
    let (status, booking) = create_booking(state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = booking["id"].as_str().unwrap().to_string();
    assert_eq!(admin_set_status(state, &booking_id, "CONFIRMED").await, StatusCode::OK);
    (token, booking_id)
}

// ── Health & Auth ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_register_login_me() {
    let state = test_state();

    let (status, json) = send(
        &state,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "name": "Bob",
                "email": "Bob@Example.com",
                "password": "correct-horse",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["email"], "bob@example.com");
    assert_eq!(json["user"]["role"], "USER");
    assert!(json["user"].get("password_hash").is_none());

    let (status, json) = send(
        &state,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"email": "bob@example.com", "password": "correct-horse"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = send(&state, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Bob");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let state = test_state();
    seed_user(&state, "alice@example.com", Role::User);

    let (status, json) = send(
        &state,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "name": "Alice Again",
                "email": "ALICE@example.com",
                "password": "password123",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "conflict");
}

#[tokio::test]
async fn test_register_short_password() {
    let state = test_state();
    let (status, json) = send(
        &state,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({"name": "C", "email": "c@example.com", "password": "short"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let state = test_state();
    seed_user(&state, "alice@example.com", Role::User);

    let (status, _) = send(
        &state,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"email": "alice@example.com", "password": "wrong-password"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_requires_auth() {
    let state = test_state();
    let (status, _) = send(&state, request("GET", "/api/bookings", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, request("GET", "/api/bookings", Some("bogus.token"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Catalog ──

#[tokio::test]
async fn test_catalog_filters() {
    let state = test_state();
    let cheap = seed_vehicle(&state, 10000);
    seed_vehicle(&state, 50000);

    let (status, json) = send(&state, request("GET", "/api/vehicles", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = send(&state, request("GET", "/api/vehicles?max_daily_rate=20000", None, None)).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], cheap.as_str());

    let (_, json) = send(&state, request("GET", "/api/vehicles?status=MAINTENANCE", None, None)).await;
    assert!(json.as_array().unwrap().is_empty());

    let (status, _) = send(&state, request("GET", "/api/vehicles/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Bookings ──

#[tokio::test]
async fn test_booking_price_fixed_at_creation() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);

    let (status, json) = create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total_days"], 3);
    assert_eq!(json["total_price"], 75000);
    assert_eq!(json["status"], "PENDING");
    assert!(json["payment_status"].is_null());

    // Later rate changes do not touch the stored price
    let admin = admin_token(&state);
    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/admin/vehicles/{vehicle_id}"),
            Some(&admin),
            Some(serde_json::json!({"daily_rate": 99999})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let id = json["id"].as_str().unwrap();
    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["total_price"], 75000);
}

#[tokio::test]
async fn test_booking_date_validation() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);

    let (status, _) = create_booking(&state, &token, &vehicle_id, "2024-06-04", "2024-06-04").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_booking(&state, &token, &vehicle_id, "2024-06-04", "2024-06-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_booking(&state, &token, &vehicle_id, "06/01/2024", "2024-06-04").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overlapping_booking_rejected() {
    let state = test_state();
    let (_, alice) = seed_user(&state, "alice@example.com", Role::User);
    let (_, bob) = seed_user(&state, "bob@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);

    let (status, _) = create_booking(&state, &alice, &vehicle_id, "2024-06-01", "2024-06-04").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = create_booking(&state, &bob, &vehicle_id, "2024-06-03", "2024-06-05").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "conflict");

    // Back-to-back is fine
    let (status, _) = create_booking(&state, &bob, &vehicle_id, "2024-06-04", "2024-06-06").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancelled_booking_frees_dates() {
    let state = test_state();
    let (_, alice) = seed_user(&state, "alice@example.com", Role::User);
    let (_, bob) = seed_user(&state, "bob@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);

    let (_, json) = create_booking(&state, &alice, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let id = json["id"].as_str().unwrap();
    let (status, _) = send(&state, request("POST", &format!("/api/bookings/{id}/cancel"), Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = create_booking(&state, &bob, &vehicle_id, "2024-06-02", "2024-06-03").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unavailable_vehicle_rejected() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    {
        let db = state.db();
        queries::set_vehicle_status(&db, &vehicle_id, VehicleStatus::Maintenance).unwrap();
    }

    let (status, _) = create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_user_cannot_confirm_own_booking() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    let (_, json) = create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let id = json["id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/bookings/{id}/status"),
            Some(&token),
            Some(serde_json::json!({"status": "CONFIRMED"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "PENDING");
}

#[tokio::test]
async fn test_unknown_status_value_rejected_at_boundary() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    let (_, json) = create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let id = json["id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/bookings/{id}/status"),
            Some(&token),
            Some(serde_json::json!({"status": "cancelled"})),
        ),
    )
    .await;
    assert!(status.is_client_error());

    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "PENDING");
}

#[tokio::test]
async fn test_cancelled_cannot_complete() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;

    let (status, json) = send(&state, request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");

    assert_eq!(admin_set_status(&state, &id, "COMPLETED").await, StatusCode::CONFLICT);

    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "CANCELLED");

    // Admin reset goes back to PENDING
    assert_eq!(admin_set_status(&state, &id, "PENDING").await, StatusCode::OK);
    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(json["status"], "PENDING");
}

#[tokio::test]
async fn test_reset_rejected_when_dates_taken() {
    let state = test_state();
    let (_, alice) = seed_user(&state, "alice@example.com", Role::User);
    let (_, bob) = seed_user(&state, "bob@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);

    let (_, first) = create_booking(&state, &alice, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let first_id = first["id"].as_str().unwrap();
    let (status, _) = send(&state, request("POST", &format!("/api/bookings/{first_id}/cancel"), Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = create_booking(&state, &bob, &vehicle_id, "2024-06-02", "2024-06-05").await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(admin_set_status(&state, first_id, "PENDING").await, StatusCode::CONFLICT);

    let (_, json) = send(&state, request("GET", &format!("/api/bookings/{first_id}"), Some(&alice), None)).await;
    assert_eq!(json["status"], "CANCELLED");
    let live = {
        let db = state.db();
        queries::find_overlapping_bookings(
            &db,
            &vehicle_id,
            &chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            &chrono::NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
        )
        .unwrap()
    };
    assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn test_completed_is_terminal() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    assert_eq!(admin_set_status(&state, &id, "COMPLETED").await, StatusCode::OK);

    for target in ["PENDING", "CONFIRMED", "CANCELLED"] {
        assert_eq!(admin_set_status(&state, &id, target).await, StatusCode::CONFLICT);
    }
    let (status, _) = send(&state, request("POST", &format!("/api/bookings/{id}/cancel"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_other_user_cannot_touch_booking() {
    let state = test_state();
    let (_, alice) = seed_user(&state, "alice@example.com", Role::User);
    let (_, mallory) = seed_user(&state, "mallory@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    let (_, json) = create_booking(&state, &alice, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let id = json["id"].as_str().unwrap();

    let (status, _) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&mallory), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, request("POST", &format!("/api/bookings/{id}/cancel"), Some(&mallory), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, json) = send(&state, request("GET", "/api/bookings", Some(&mallory), None)).await;
    assert!(json.as_array().unwrap().is_empty());
}

// ── Payments & Tickets ──

#[tokio::test]
async fn test_pay_pending_booking_rejected() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    let (_, json) = create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;
    let id = json["id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_decline_then_accept_then_replay() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;

    // Declined: nothing changes
    let (status, json) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242420002"))),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["code"], "payment_declined");

    let (_, booking) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert!(booking["payment_status"].is_null());
    let (status, _) = send(&state, request("GET", &format!("/api/bookings/{id}/ticket"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Accepted
    let (status, ticket) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["amount"], 75000);
    assert_eq!(ticket["currency"], "USD");
    assert_eq!(ticket["card_masked"], "**** **** **** 1111");
    assert_eq!(ticket["payment_method"], "Visa");
    assert_eq!(ticket["vehicle_label"], "Toyota Corolla (2022)");
    assert_eq!(ticket["customer_email"], "alice@example.com");

    let (_, booking) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(booking["payment_status"], "COMPLETED");

    // Replay returns the original ticket, even with another card
    let (status, replay) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("5555555555554444"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, ticket);

    let (status, fetched) = send(&state, request("GET", &format!("/api/bookings/{id}/ticket"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, ticket);

    let admin = admin_token(&state);
    let (_, payments) = send(&state, request("GET", "/api/admin/payments", Some(&admin), None)).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
    assert_eq!(payments[0]["status"], "COMPLETED");
}

#[tokio::test]
async fn test_invalid_card_is_validation_error() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;

    let mut bad = card("4242424242421111");
    bad["expiry"] = serde_json::json!("13/99");
    let (status, json) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(bad)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");

    let (status, _) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_checked_before_card() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    let (_, mallory) = seed_user(&state, "mallory@example.com", Role::User);

    // Someone else's booking: ownership wins over card format
    let (status, _) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&mallory), Some(card("4242"))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unpayable status: state conflict wins over card format
    let vehicle_id = seed_vehicle(&state, 10000);
    let (_, pending) = create_booking(&state, &token, &vehicle_id, "2024-07-01", "2024-07-02").await;
    let pending_id = pending["id"].as_str().unwrap();
    let (status, _) = send(
        &state,
        request("POST", &format!("/api/bookings/{pending_id}/pay"), Some(&token), Some(card("4242"))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Paid booking: a replay with malformed card data returns the stored ticket
    let (status, ticket) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, replay) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, ticket);
}

#[tokio::test]
async fn test_cancel_during_charge_is_not_recorded() {
    let state = test_state_with_gateway(|db| Box::new(CancellingGateway { db }));
    let (token, id) = confirmed_booking(&state).await;

    let (status, json) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "conflict");

    let (_, booking) = send(&state, request("GET", &format!("/api/bookings/{id}"), Some(&token), None)).await;
    assert_eq!(booking["status"], "CANCELLED");
    assert!(booking["payment_status"].is_null());

    let (status, _) = send(&state, request("GET", &format!("/api/bookings/{id}/ticket"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin = admin_token(&state);
    let (_, payments) = send(&state, request("GET", "/api/admin/payments", Some(&admin), None)).await;
    assert!(payments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ticket_is_snapshot_taken_at_payment() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    let (status, ticket) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let vehicle_id = {
        let db = state.db();
        queries::get_booking_by_id(&db, &id).unwrap().unwrap().vehicle_id
    };
    let admin = admin_token(&state);
    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/admin/vehicles/{vehicle_id}"),
            Some(&admin),
            Some(serde_json::json!({"brand": "Honda"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, replay) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, ticket);
    assert_eq!(replay["vehicle_label"], "Toyota Corolla (2022)");

    let (_, fetched) = send(&state, request("GET", &format!("/api/bookings/{id}/ticket"), Some(&token), None)).await;
    assert_eq!(fetched, ticket);
}

#[tokio::test]
async fn test_ticket_print_and_download() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    let (status, ticket) = send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let txn = ticket["transaction_id"].as_str().unwrap();

    let res = test_app(state.clone())
        .oneshot(request("GET", &format!("/api/bookings/{id}/ticket/print"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(txn));
    assert!(html.contains("75,000 USD"));

    let res = test_app(state.clone())
        .oneshot(request("GET", &format!("/api/bookings/{id}/ticket.txt"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers().get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap().to_string();
    assert!(disposition.contains(&format!("ticket-{txn}.txt")));
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("**** **** **** 1111"));
}

// ── Admin ──

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);

    for uri in ["/api/admin/stats", "/api/admin/users", "/api/admin/bookings", "/api/admin/payments"] {
        let (status, _) = send(&state, request("GET", uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        let (status, _) = send(&state, request("GET", uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_admin_block_unblock_user() {
    let state = test_state();
    let (user_id, token) = seed_user(&state, "alice@example.com", Role::User);
    let admin = admin_token(&state);

    let (status, _) = send(&state, request("POST", &format!("/api/admin/users/{user_id}/block"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, request("GET", "/api/bookings", Some(&token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &state,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"email": "alice@example.com", "password": "password123"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&state, request("POST", &format!("/api/admin/users/{user_id}/unblock"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, request("GET", "/api/bookings", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, request("POST", "/api/admin/users/missing/block", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_block_self() {
    let state = test_state();
    let admin = admin_token(&state);
    let admin_id = {
        let db = state.db();
        queries::get_user_by_email(&db, "admin@example.com").unwrap().unwrap().id
    };

    let (status, _) = send(&state, request("POST", &format!("/api/admin/users/{admin_id}/block"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_fleet_management() {
    let state = test_state();
    let admin = admin_token(&state);

    let (status, vehicle) = send(
        &state,
        request(
            "POST",
            "/api/admin/vehicles",
            Some(&admin),
            Some(serde_json::json!({
                "brand": "Honda",
                "model": "Civic",
                "year": 2021,
                "category": "Sedan",
                "daily_rate": 30000,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(vehicle["status"], "AVAILABLE");
    let id = vehicle["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/admin/vehicles/{id}/status"),
            Some(&admin),
            Some(serde_json::json!({"status": "MAINTENANCE"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, detail) = send(&state, request("GET", &format!("/api/vehicles/{id}"), None, None)).await;
    assert_eq!(detail["status"], "MAINTENANCE");

    let (status, _) = send(
        &state,
        request(
            "POST",
            "/api/admin/vehicles",
            Some(&admin),
            Some(serde_json::json!({
                "brand": "Honda",
                "model": "Civic",
                "year": 2021,
                "category": "Sedan",
                "daily_rate": -5,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&state, request("DELETE", &format!("/api/admin/vehicles/{id}"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&state, request("GET", &format!("/api/vehicles/{id}"), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_vehicle_with_bookings_rejected() {
    let state = test_state();
    let (_, token) = seed_user(&state, "alice@example.com", Role::User);
    let vehicle_id = seed_vehicle(&state, 25000);
    create_booking(&state, &token, &vehicle_id, "2024-06-01", "2024-06-04").await;

    let admin = admin_token(&state);
    let (status, _) = send(&state, request("DELETE", &format!("/api/admin/vehicles/{vehicle_id}"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_bookings_filter_and_stats() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    let vehicle_id = seed_vehicle(&state, 10000);
    create_booking(&state, &token, &vehicle_id, "2024-07-01", "2024-07-02").await;

    let admin = admin_token(&state);
    let (_, json) = send(&state, request("GET", "/api/admin/bookings?status=CONFIRMED", Some(&admin), None)).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id.as_str());

    send(
        &state,
        request("POST", &format!("/api/bookings/{id}/pay"), Some(&token), Some(card("4242424242421111"))),
    )
    .await;

    let (status, stats) = send(&state, request("GET", "/api/admin/stats", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"], 2);
    assert_eq!(stats["bookings_pending"], 1);
    assert_eq!(stats["bookings_confirmed"], 1);
    assert_eq!(stats["revenue"], 75000);
}

// ── Reviews & Notifications ──

#[tokio::test]
async fn test_review_requires_completed_rental() {
    let state = test_state();
    let (token, id) = confirmed_booking(&state).await;
    let vehicle_id = {
        let db = state.db();
        queries::get_booking_by_id(&db, &id).unwrap().unwrap().vehicle_id
    };
    let review = serde_json::json!({"rating": 5, "comment": "Great car"});
    let uri = format!("/api/vehicles/{vehicle_id}/reviews");

    let (status, _) = send(&state, request("POST", &uri, Some(&token), Some(review.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(admin_set_status(&state, &id, "COMPLETED").await, StatusCode::OK);

    let (status, json) = send(&state, request("POST", &uri, Some(&token), Some(review.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user_name"], "alice");

    let (status, _) = send(&state, request("POST", &uri, Some(&token), Some(review))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &state,
        request("POST", &uri, Some(&token), Some(serde_json::json!({"rating": 9}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = send(&state, request("GET", &uri, None, None)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, detail) = send(&state, request("GET", &format!("/api/vehicles/{vehicle_id}"), None, None)).await;
    assert_eq!(detail["average_rating"], 5.0);
    assert_eq!(detail["review_count"], 1);
}

#[tokio::test]
async fn test_notifications_follow_booking_lifecycle() {
    let state = test_state();
    let (token, _id) = confirmed_booking(&state).await;

    let (status, json) = send(&state, request("GET", "/api/notifications", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Newest first
    assert_eq!(list[0]["kind"], "booking_status");
    assert_eq!(list[1]["kind"], "booking_created");
    assert_eq!(list[0]["is_read"], false);

    let nid = list[0]["id"].as_i64().unwrap();
    let (status, _) = send(&state, request("POST", &format!("/api/notifications/{nid}/read"), Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&state, request("GET", "/api/notifications", Some(&token), None)).await;
    assert_eq!(json[0]["is_read"], true);

    let (_, other) = seed_user(&state, "bob@example.com", Role::User);
    let (status, _) = send(&state, request("POST", &format!("/api/notifications/{nid}/read"), Some(&other), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_rejects_bad_token() {
    let state = test_state();
    let (status, _) = send(&state, request("GET", "/api/notifications/events?token=nope", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Client ──

async fn spawn_server(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = test_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_client_optimistic_flow() {
    let state = test_state();
    let vehicle_id = seed_vehicle(&state, 25000);
    let client = ApiClient::new(spawn_server(state.clone()).await);

    let alice = client.register("Alice", "alice@example.com", "password123").await.unwrap();
    let admin = client.login("admin@example.com", "admin-password").await.unwrap();
    assert_eq!(admin.role, Role::Admin);

    let vehicles = client.list_vehicles().await.unwrap();
    assert_eq!(vehicles.len(), 1);

    let booking = client
        .create_booking(
            &alice,
            &NewBooking {
                vehicle_id: vehicle_id.clone(),
                start_date: "2024-06-01".to_string(),
                end_date: "2024-06-04".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(booking.total_price, 75000);

    let mut store = BookingStore::new();
    store.apply(StoreAction::Loaded(client.list_bookings(&alice).await.unwrap()));

    // Rejected: user tries to confirm; store rolls back to the server's PENDING
    let err = client
        .transition_optimistic(&alice, &mut store, &booking.id, BookingStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));
    assert_eq!(store.status(&booking.id), Some(BookingStatus::Pending));
    assert!(!store.is_tentative(&booking.id));

    // Admin confirms, then the user's view picks it up
    client.set_status(&admin, &booking.id, BookingStatus::Confirmed).await.unwrap();
    store.apply(StoreAction::Loaded(client.list_bookings(&alice).await.unwrap()));
    assert_eq!(store.status(&booking.id), Some(BookingStatus::Confirmed));

    let declined = CardDetails {
        card_number: "4242424242420002".to_string(),
        card_holder: "Alice".to_string(),
        expiry: "12/27".to_string(),
        cvv: "123".to_string(),
    };
    let err = client.pay(&alice, &booking.id, &declined).await.unwrap_err();
    assert!(matches!(err, ClientError::Declined(_)));
    assert!(client.ticket(&alice, &booking.id).await.unwrap().is_none());

    let accepted = CardDetails {
        card_number: "4242424242421111".to_string(),
        ..declined
    };
    let ticket = client.pay(&alice, &booking.id, &accepted).await.unwrap();
    assert_eq!(ticket.amount, 75000);
    assert_eq!(client.ticket(&alice, &booking.id).await.unwrap(), Some(ticket));

    // Accepted: user cancels; tentative state resolves to the server's answer
    let cancelled = client
        .transition_optimistic(&alice, &mut store, &booking.id, BookingStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(store.status(&booking.id), Some(BookingStatus::Cancelled));
    assert!(!store.is_tentative(&booking.id));
}
