use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub card_masked: String,
    pub card_holder: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}
