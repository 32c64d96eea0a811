//! Core business logic - framework-agnostic invoicing, payment, scheduling,
//! permission and time tracking operations.

pub mod events;
pub mod invoice;
pub mod payment;
pub mod permissions;
pub mod recurring;
pub mod report;
pub mod schedule;
pub mod time_tracking;
pub mod totals;
