use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, PaymentRecord};
use crate::errors::AppError;
use crate::models::{BookingStatus, Payment, PaymentStatus, Ticket};
use crate::services::auth::Session;
use crate::services::notifications::{self, KIND_PAYMENT_COMPLETED};
use crate::services::ticket;
use crate::state::AppState;

/// Card numbers ending in these digits are always declined by the simulator.
pub const DECLINE_SUFFIX: &str = "0002";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub card_holder: String,
    pub expiry: String,
    pub cvv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    #[error("card number must be 16 digits")]
    Number,
    #[error("card holder name is required")]
    Holder,
    #[error("expiry must be MM/YY")]
    Expiry,
    #[error("CVV must be 3 or 4 digits")]
    Cvv,
}

/// Card data that passed format checks. Only the digits and holder survive;
/// expiry and CVV never reach storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCard {
    digits: String,
    holder: String,
}

impl ValidatedCard {
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn last4(&self) -> &str {
        &self.digits[self.digits.len() - 4..]
    }

    pub fn masked(&self) -> String {
        format!("**** **** **** {}", self.last4())
    }

    pub fn brand(&self) -> &'static str {
        match self.digits.as_bytes()[0] {
            b'4' => "Visa",
            b'5' | b'2' => "Mastercard",
            b'3' => "American Express",
            b'6' => "Discover",
            _ => "Card",
        }
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Format-only checks. None of these influence whether the simulator
/// approves the charge.
pub fn validate_card(card: &CardDetails) -> Result<ValidatedCard, CardError> {
    let digits: String = card
        .card_number
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    if digits.len() != 16 || !all_digits(&digits) {
        return Err(CardError::Number);
    }

    let holder = card.card_holder.trim();
    if holder.is_empty() {
        return Err(CardError::Holder);
    }

    let (month, year) = card.expiry.trim().split_once('/').ok_or(CardError::Expiry)?;
    if month.len() != 2 || year.len() != 2 || !all_digits(month) || !all_digits(year) {
        return Err(CardError::Expiry);
    }
    let month: u32 = month.parse().map_err(|_| CardError::Expiry)?;
    if !(1..=12).contains(&month) {
        return Err(CardError::Expiry);
    }

    let cvv = card.cvv.trim();
    if !(3..=4).contains(&cvv.len()) || !all_digits(cvv) {
        return Err(CardError::Cvv);
    }

    Ok(ValidatedCard {
        digits,
        holder: holder.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        card: &ValidatedCard,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<ChargeOutcome>;
}

/// Deterministic stand-in for a card processor.
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        card: &ValidatedCard,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<ChargeOutcome> {
        if card.last4() == DECLINE_SUFFIX {
            tracing::info!(amount, currency, "simulated charge declined");
            return Ok(ChargeOutcome::Declined {
                reason: "card was declined, try another card".to_string(),
            });
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let transaction_id = format!("TXN-{}-{suffix}", Utc::now().format("%Y%m%d"));
        tracing::info!(amount, currency, transaction_id = %transaction_id, "simulated charge approved");
        Ok(ChargeOutcome::Approved { transaction_id })
    }
}

/// Pays a CONFIRMED booking and returns its ticket. Replays after a
/// successful payment return the stored ticket without charging again, even
/// when the card data is malformed. A decline leaves every stored row untouched.
pub async fn process_payment(
    state: &AppState,
    session: &Session,
    booking_id: &str,
    card: &CardDetails,
) -> Result<Ticket, AppError> {
    let booking = {
        let db = state.db();
        let booking = queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        if !session.can_access(&booking.user_id) {
            return Err(AppError::Forbidden("not your booking".to_string()));
        }
        if let Some(existing) = queries::get_ticket(&db, booking_id)? {
            tracing::info!(booking_id, "payment replay, returning existing ticket");
            return Ok(existing);
        }
        booking
    };

    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::Conflict(format!(
            "booking is {}, only CONFIRMED bookings can be paid",
            booking.status
        )));
    }

    let card = validate_card(card).map_err(|e| AppError::Validation(e.to_string()))?;

    let currency = state.config.currency.clone();
    let outcome = state
        .gateway
        .charge(&card, booking.total_price, &currency)
        .await?;

    let transaction_id = match outcome {
        ChargeOutcome::Approved { transaction_id } => transaction_id,
        ChargeOutcome::Declined { reason } => {
            tracing::info!(booking_id, "payment declined");
            return Err(AppError::PaymentDeclined(reason));
        }
    };

    let payment = Payment {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        amount: booking.total_price,
        currency,
        payment_method: card.brand().to_string(),
        status: PaymentStatus::Completed,
        transaction_id,
        card_masked: card.masked(),
        card_holder: card.holder().to_string(),
        created_at: Utc::now().naive_utc(),
    };

    let mut db = state.db();
    let vehicle = queries::get_vehicle(&db, &booking.vehicle_id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking {} has no vehicle", booking.id)))?;
    let customer = queries::get_user_by_id(&db, &booking.user_id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking {} has no customer", booking.id)))?;
    let snapshot = ticket::build_ticket(&payment, &booking, &vehicle, &customer);

    match queries::record_completed_payment(&mut db, &payment, &snapshot)? {
        PaymentRecord::Recorded(stored) => {
            tracing::info!(
                booking_id,
                payment_id = %stored.id,
                amount = stored.amount,
                "payment completed"
            );
            notifications::notify(
                &db,
                &state.notify_tx,
                &booking.user_id,
                KIND_PAYMENT_COMPLETED,
                &format!("Payment {} received for booking {}", stored.transaction_id, booking.id),
            );
        }
        PaymentRecord::AlreadyPaid(existing) => {
            tracing::warn!(
                booking_id,
                kept = %existing.transaction_id,
                discarded = %payment.transaction_id,
                "concurrent payment already completed, discarding charge"
            );
        }
        PaymentRecord::NotConfirmed => {
            tracing::warn!(
                booking_id,
                transaction_id = %payment.transaction_id,
                "booking left CONFIRMED during the charge, payment not recorded"
            );
            return Err(AppError::Conflict(
                "booking is no longer CONFIRMED, payment was not recorded".to_string(),
            ));
        }
    }

    queries::get_ticket(&db, booking_id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("ticket missing after payment")))
}
