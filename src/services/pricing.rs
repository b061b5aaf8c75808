use chrono::NaiveDate;

use crate::db::DATE_FORMAT;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("end date must be after start date")]
    EmptyRange,

    #[error("rental total is too large")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub total_days: i64,
    pub total_price: i64,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, PricingError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| PricingError::InvalidDate(s.to_string()))
}

/// Prices a rental of `[start, end)` at `daily_rate`. The result is fixed at
/// booking time; later rate changes do not touch existing bookings.
pub fn quote(start: NaiveDate, end: NaiveDate, daily_rate: i64) -> Result<Quote, PricingError> {
    if end <= start {
        return Err(PricingError::EmptyRange);
    }

    let total_days = (end - start).num_days();
    let total_price = total_days
        .checked_mul(daily_rate)
        .ok_or(PricingError::Overflow)?;

    Ok(Quote {
        total_days,
        total_price,
    })
}
