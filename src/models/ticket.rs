use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Read-only receipt for a completed payment. Every presentation (JSON,
/// print view, text download) is rendered from this one value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub booking_id: String,
    pub transaction_id: String,
    pub processed_at: NaiveDateTime,
    pub card_masked: String,
    pub card_holder: String,
    pub customer_name: String,
    pub customer_email: String,
    pub vehicle_label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
}
