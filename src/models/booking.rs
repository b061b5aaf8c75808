use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{ParseEnumError, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub vehicle_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub total_price: i64,
    pub status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn is_paid(&self) -> bool {
        self.payment_status == Some(PaymentStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(ParseEnumError::new("booking status", other)),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
