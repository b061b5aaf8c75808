use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use super::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::models::{
    Booking, BookingStatus, Notification, Payment, PaymentStatus, Review, Ticket, User,
    UserStatus, Vehicle, VehicleStatus,
};

fn now_str() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid date in database: {s}"))
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

// ── Users ──

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, role, status, created_at";

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, password_hash, role, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id,
            user.name,
            user.email,
            user.phone,
            user.password_hash,
            user.role.as_str(),
            user.status.as_str(),
            fmt_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
        params![email],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_user_row(row)))?;
    collect(rows)
}

pub fn set_user_status(conn: &Connection, id: &str, status: UserStatus) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        role: role.parse()?,
        status: status.parse()?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Vehicles ──

const VEHICLE_COLUMNS: &str = "id, brand, model, year, category, daily_rate, seats, image_url, description, status, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct VehicleFilter {
    pub category: Option<String>,
    pub status: Option<VehicleStatus>,
    pub max_daily_rate: Option<i64>,
}

pub fn create_vehicle(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO vehicles (id, brand, model, year, category, daily_rate, seats, image_url, description, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            vehicle.id,
            vehicle.brand,
            vehicle.model,
            vehicle.year,
            vehicle.category,
            vehicle.daily_rate,
            vehicle.seats,
            vehicle.image_url,
            vehicle.description,
            vehicle.status.as_str(),
            fmt_ts(&vehicle.created_at),
            fmt_ts(&vehicle.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_vehicle(conn: &Connection, id: &str) -> anyhow::Result<Option<Vehicle>> {
    let result = conn.query_row(
        &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"),
        params![id],
        |row| Ok(parse_vehicle_row(row)),
    );

    match result {
        Ok(vehicle) => Ok(Some(vehicle?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_vehicles(conn: &Connection, filter: &VehicleFilter) -> anyhow::Result<Vec<Vehicle>> {
    let mut sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE 1 = 1");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(category) = &filter.category {
        params_vec.push(Box::new(category.clone()));
        sql.push_str(&format!(" AND category = ?{} COLLATE NOCASE", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(max) = filter.max_daily_rate {
        params_vec.push(Box::new(max));
        sql.push_str(&format!(" AND daily_rate <= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY brand ASC, model ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_vehicle_row(row)))?;
    collect(rows)
}

pub fn update_vehicle(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE vehicles SET brand = ?1, model = ?2, year = ?3, category = ?4, daily_rate = ?5,
           seats = ?6, image_url = ?7, description = ?8, status = ?9, updated_at = ?10
         WHERE id = ?11",
        params![
            vehicle.brand,
            vehicle.model,
            vehicle.year,
            vehicle.category,
            vehicle.daily_rate,
            vehicle.seats,
            vehicle.image_url,
            vehicle.description,
            vehicle.status.as_str(),
            now_str(),
            vehicle.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_vehicle_status(
    conn: &Connection,
    id: &str,
    status: VehicleStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE vehicles SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_vehicle(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM vehicles WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn count_bookings_for_vehicle(conn: &Connection, vehicle_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE vehicle_id = ?1",
        params![vehicle_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_vehicle_row(row: &rusqlite::Row) -> anyhow::Result<Vehicle> {
    let status: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Vehicle {
        id: row.get(0)?,
        brand: row.get(1)?,
        model: row.get(2)?,
        year: row.get(3)?,
        category: row.get(4)?,
        daily_rate: row.get(5)?,
        seats: row.get(6)?,
        image_url: row.get(7)?,
        description: row.get(8)?,
        status: status.parse()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, vehicle_id, start_date, end_date, total_days, total_price, status, payment_status, notes, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, vehicle_id, start_date, end_date, total_days, total_price, status, payment_status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.id,
            booking.user_id,
            booking.vehicle_id,
            fmt_date(&booking.start_date),
            fmt_date(&booking.end_date),
            booking.total_days,
            booking.total_price,
            booking.status.as_str(),
            booking.payment_status.map(|s| s.as_str()),
            booking.notes,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC, id ASC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;
    collect(rows)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY start_date DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.as_str()) as Box<dyn ToSql>,
                Box::new(limit) as Box<dyn ToSql>,
            ],
        ),
        None => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY start_date DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;
    collect(rows)
}

/// Live (PENDING or CONFIRMED) bookings of a vehicle whose `[start, end)`
/// range intersects the given one.
pub fn find_overlapping_bookings(
    conn: &Connection,
    vehicle_id: &str,
    start: &NaiveDate,
    end: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE vehicle_id = ?1 AND start_date < ?3 AND end_date > ?2
           AND status IN ('PENDING', 'CONFIRMED')
         ORDER BY start_date ASC"
    ))?;
    let rows = stmt.query_map(
        params![vehicle_id, fmt_date(start), fmt_date(end)],
        |row| Ok(parse_booking_row(row)),
    )?;
    collect(rows)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn has_completed_booking(
    conn: &Connection,
    user_id: &str,
    vehicle_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE user_id = ?1 AND vehicle_id = ?2 AND status = 'COMPLETED'",
        params![user_id, vehicle_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_date: String = row.get(3)?;
    let end_date: String = row.get(4)?;
    let status: String = row.get(7)?;
    let payment_status: Option<String> = row.get(8)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        vehicle_id: row.get(2)?,
        start_date: parse_date(&start_date)?,
        end_date: parse_date(&end_date)?,
        total_days: row.get(5)?,
        total_price: row.get(6)?,
        status: status.parse()?,
        payment_status: payment_status
            .map(|s| s.parse::<PaymentStatus>())
            .transpose()?,
        notes: row.get(9)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str = "id, booking_id, amount, currency, payment_method, status, transaction_id, card_masked, card_holder, created_at";

pub fn get_completed_payment(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1 AND status = 'COMPLETED'"
        ),
        params![booking_id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Outcome of storing an approved charge.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentRecord {
    /// Payment, paid flag and ticket snapshot were written together.
    Recorded(Payment),
    /// Another COMPLETED payment landed first and is returned untouched.
    AlreadyPaid(Payment),
    /// The booking is no longer CONFIRMED. Nothing was written.
    NotConfirmed,
}

/// Stores a COMPLETED payment, marks its booking paid and writes the ticket
/// snapshot in one transaction. The booking must still be CONFIRMED.
pub fn record_completed_payment(
    conn: &mut Connection,
    payment: &Payment,
    ticket: &Ticket,
) -> anyhow::Result<PaymentRecord> {
    let tx = conn.transaction()?;

    if let Some(existing) = get_completed_payment(&tx, &payment.booking_id)? {
        return Ok(PaymentRecord::AlreadyPaid(existing));
    }

    let marked = tx.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'CONFIRMED'",
        params![PaymentStatus::Completed.as_str(), now_str(), payment.booking_id],
    )?;
    if marked == 0 {
        // Dropping the transaction rolls it back
        return Ok(PaymentRecord::NotConfirmed);
    }

    tx.execute(
        "INSERT INTO payments (id, booking_id, amount, currency, payment_method, status, transaction_id, card_masked, card_holder, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.id,
            payment.booking_id,
            payment.amount,
            payment.currency,
            payment.payment_method,
            PaymentStatus::Completed.as_str(),
            payment.transaction_id,
            payment.card_masked,
            payment.card_holder,
            fmt_ts(&payment.created_at),
        ],
    )?;
    insert_ticket(&tx, &payment.id, ticket)?;
    tx.commit()?;

    Ok(PaymentRecord::Recorded(Payment {
        status: PaymentStatus::Completed,
        ..payment.clone()
    }))
}

pub fn list_payments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_payment_row(row)))?;
    collect(rows)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(9)?;

    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        payment_method: row.get(4)?,
        status: status.parse()?,
        transaction_id: row.get(6)?,
        card_masked: row.get(7)?,
        card_holder: row.get(8)?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Tickets ──

const TICKET_COLUMNS: &str = "booking_id, transaction_id, processed_at, card_masked, card_holder, customer_name, customer_email, vehicle_label, start_date, end_date, total_days, amount, currency, payment_method";

fn insert_ticket(conn: &Connection, payment_id: &str, ticket: &Ticket) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO tickets (payment_id, {TICKET_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            payment_id,
            ticket.booking_id,
            ticket.transaction_id,
            fmt_ts(&ticket.processed_at),
            ticket.card_masked,
            ticket.card_holder,
            ticket.customer_name,
            ticket.customer_email,
            ticket.vehicle_label,
            fmt_date(&ticket.start_date),
            fmt_date(&ticket.end_date),
            ticket.total_days,
            ticket.amount,
            ticket.currency,
            ticket.payment_method,
        ],
    )?;
    Ok(())
}

/// Ticket snapshot for a booking, or `None` until it has been paid.
pub fn get_ticket(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Ticket>> {
    let result = conn.query_row(
        &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE booking_id = ?1"),
        params![booking_id],
        |row| Ok(parse_ticket_row(row)),
    );

    match result {
        Ok(ticket) => Ok(Some(ticket?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_ticket_row(row: &rusqlite::Row) -> anyhow::Result<Ticket> {
    let processed_at: String = row.get(2)?;
    let start_date: String = row.get(8)?;
    let end_date: String = row.get(9)?;

    Ok(Ticket {
        booking_id: row.get(0)?,
        transaction_id: row.get(1)?,
        processed_at: parse_ts(&processed_at)?,
        card_masked: row.get(3)?,
        card_holder: row.get(4)?,
        customer_name: row.get(5)?,
        customer_email: row.get(6)?,
        vehicle_label: row.get(7)?,
        start_date: parse_date(&start_date)?,
        end_date: parse_date(&end_date)?,
        total_days: row.get(10)?,
        amount: row.get(11)?,
        currency: row.get(12)?,
        payment_method: row.get(13)?,
    })
}

// ── Reviews ──

pub fn create_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, user_id, vehicle_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            review.id,
            review.user_id,
            review.vehicle_id,
            review.rating,
            review.comment,
            fmt_ts(&review.created_at),
        ],
    )?;
    Ok(())
}

pub fn has_review(conn: &Connection, user_id: &str, vehicle_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE user_id = ?1 AND vehicle_id = ?2",
        params![user_id, vehicle_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_reviews_for_vehicle(conn: &Connection, vehicle_id: &str) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.user_id, u.name, r.vehicle_id, r.rating, r.comment, r.created_at
         FROM reviews r JOIN users u ON u.id = r.user_id
         WHERE r.vehicle_id = ?1 ORDER BY r.created_at DESC",
    )?;
    let rows = stmt.query_map(params![vehicle_id], |row| Ok(parse_review_row(row)))?;
    collect(rows)
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let created_at: String = row.get(6)?;
    Ok(Review {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        vehicle_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_ts(&created_at)?,
    })
}

pub fn get_average_rating(conn: &Connection, vehicle_id: &str) -> anyhow::Result<Option<f64>> {
    let avg = conn.query_row(
        "SELECT AVG(rating) FROM reviews WHERE vehicle_id = ?1",
        params![vehicle_id],
        |row| row.get(0),
    )?;
    Ok(avg)
}

// ── Notifications ──

pub fn insert_notification(
    conn: &Connection,
    user_id: &str,
    kind: &str,
    message: &str,
) -> anyhow::Result<Notification> {
    let created_at = now_str();
    conn.execute(
        "INSERT INTO notifications (user_id, kind, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, kind, message, created_at],
    )?;

    Ok(Notification {
        id: conn.last_insert_rowid(),
        user_id: user_id.to_string(),
        kind: kind.to_string(),
        message: message.to_string(),
        is_read: false,
        created_at,
    })
}

pub fn get_notifications(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, message, is_read, created_at FROM notifications
         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], parse_notification_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_notifications_since(
    conn: &Connection,
    user_id: &str,
    last_id: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, message, is_read, created_at FROM notifications
         WHERE user_id = ?1 AND id > ?2 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![user_id, last_id], parse_notification_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn mark_notification_read(conn: &Connection, user_id: &str, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(count > 0)
}

fn parse_notification_row(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ── Dashboard ──

#[derive(Debug, serde::Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub vehicles_available: i64,
    pub bookings_pending: i64,
    pub bookings_confirmed: i64,
    pub bookings_cancelled: i64,
    pub bookings_completed: i64,
    pub revenue: i64,
}

pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let vehicles_available: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vehicles WHERE status = 'AVAILABLE'",
        [],
        |row| row.get(0),
    )?;

    let count_status = |status: BookingStatus| -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )
    };

    let revenue: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'COMPLETED'",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        users,
        vehicles_available,
        bookings_pending: count_status(BookingStatus::Pending)?,
        bookings_confirmed: count_status(BookingStatus::Confirmed)?,
        bookings_cancelled: count_status(BookingStatus::Cancelled)?,
        bookings_completed: count_status(BookingStatus::Completed)?,
        revenue,
    })
}
