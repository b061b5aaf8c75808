use std::collections::{BTreeMap, HashMap};

use crate::models::{Booking, BookingStatus};

/// Everything that can change the local view of bookings.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Full authoritative list from the server; drops any tentative state.
    Loaded(Vec<Booking>),
    /// Local guess applied before the server has answered.
    Tentative { id: String, status: BookingStatus },
    /// Server's view of one booking; replaces whatever is held locally.
    Reconciled(Booking),
    /// Server refused the tentative change; put the prior status back.
    Rejected { id: String },
}

/// Client-side booking cache driven by [`StoreAction`]s.
#[derive(Debug, Default, Clone)]
pub struct BookingStore {
    bookings: BTreeMap<String, Booking>,
    prior: HashMap<String, BookingStatus>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: StoreAction) {
        match action {
            StoreAction::Loaded(bookings) => {
                self.prior.clear();
                self.bookings = bookings.into_iter().map(|b| (b.id.clone(), b)).collect();
            }
            StoreAction::Tentative { id, status } => {
                if let Some(booking) = self.bookings.get_mut(&id) {
                    // Keep the oldest confirmed status if guesses stack up
                    self.prior.entry(id).or_insert(booking.status);
                    booking.status = status;
                }
            }
            StoreAction::Reconciled(booking) => {
                self.prior.remove(&booking.id);
                self.bookings.insert(booking.id.clone(), booking);
            }
            StoreAction::Rejected { id } => {
                if let Some(status) = self.prior.remove(&id) {
                    if let Some(booking) = self.bookings.get_mut(&id) {
                        booking.status = status;
                    }
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn status(&self, id: &str) -> Option<BookingStatus> {
        self.bookings.get(id).map(|b| b.status)
    }

    /// True while a local change is waiting for the server.
    pub fn is_tentative(&self, id: &str) -> bool {
        self.prior.contains_key(id)
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}
