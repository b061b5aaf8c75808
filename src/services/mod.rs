pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod lifecycle;
pub mod notifications;
pub mod payments;
pub mod pricing;
pub mod reviews;
pub mod ticket;
