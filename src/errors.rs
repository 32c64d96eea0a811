//! Unified error types and result handling.
//!
//! Validation failures carry the offending value so the caller can build a
//! user-facing message without re-deriving anything.

use crate::entities::invoice::InvoiceStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure the crate can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Integer conversion overflow
    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    /// A numeric input is outside its allowed range
    #[error("Invalid {field}: {value}")]
    InvalidAmount {
        /// Name of the rejected input
        field: &'static str,
        /// The rejected value
        value: Decimal,
    },

    /// Money arithmetic left the representable range
    #[error("{field} is too large to compute")]
    AmountOverflow {
        /// Figure that overflowed
        field: &'static str,
    },

    /// Line item quantity below one
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i32,
    },

    /// A fixed discount larger than the invoice subtotal
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        /// Requested discount
        discount: Decimal,
        /// Current subtotal
        subtotal: Decimal,
    },

    /// Payment larger than what is still owed
    #[error("Payment of {amount} exceeds remaining balance {remaining}")]
    Overpayment {
        /// Requested payment
        amount: Decimal,
        /// Outstanding balance at entry time
        remaining: Decimal,
    },

    /// Adjustment would push the paid total below zero
    #[error("Adjustment of {amount} exceeds total paid {total_paid}")]
    AdjustmentExceedsPaid {
        /// Requested adjustment (negative)
        amount: Decimal,
        /// Paid total at entry time
        total_paid: Decimal,
    },

    /// Text input that must not be blank
    #[error("{field} cannot be empty")]
    EmptyField {
        /// Name of the blank input
        field: &'static str,
    },

    /// Due date precedes issue date
    #[error("Due date {due_date} is before issue date {issue_date}")]
    InvalidDueDate {
        /// Issue date
        issue_date: NaiveDate,
        /// Rejected due date
        due_date: NaiveDate,
    },

    /// No invoice with this id
    #[error("Invoice not found: {id}")]
    InvoiceNotFound {
        /// Requested id
        id: i64,
    },

    /// No line item with this id on the invoice
    #[error("Line item {line_item_id} not found on invoice {invoice_id}")]
    LineItemNotFound {
        /// Owning invoice
        invoice_id: i64,
        /// Requested line item
        line_item_id: i64,
    },

    /// Invoice content can only change while it is a draft
    #[error("Invoice {id} is {status} and can no longer be edited")]
    InvoiceLocked {
        /// Invoice id
        id: i64,
        /// Current status
        status: InvoiceStatus,
    },

    /// Payments are only accepted on sent or overdue invoices
    #[error("Invoice {id} is {status} and does not accept payments")]
    InvoiceNotPayable {
        /// Invoice id
        id: i64,
        /// Current status
        status: InvoiceStatus,
    },

    /// Requested status change is not part of the invoice lifecycle
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status
        from: InvoiceStatus,
        /// Requested status
        to: InvoiceStatus,
    },

    /// Invoice without line items cannot be sent
    #[error("Invoice {id} has no line items")]
    EmptyInvoice {
        /// Invoice id
        id: i64,
    },

    /// No recurring template with this id
    #[error("Recurring template not found: {id}")]
    TemplateNotFound {
        /// Requested id
        id: i64,
    },

    /// Template is paused
    #[error("Recurring template {id} is inactive")]
    TemplateInactive {
        /// Template id
        id: i64,
    },

    /// Template's next date has not arrived yet
    #[error("Recurring template {id} is not due until {next_date} (as of {as_of})")]
    TemplateNotDue {
        /// Template id
        id: i64,
        /// Scheduled date
        next_date: NaiveDate,
        /// Date of the attempted generation
        as_of: NaiveDate,
    },

    /// The period was already generated by an earlier call
    #[error("Recurring template {id} already generated an invoice for {period}")]
    AlreadyGenerated {
        /// Template id
        id: i64,
        /// Period that was requested
        period: NaiveDate,
    },

    /// No user with this id
    #[error("User not found: {id}")]
    UserNotFound {
        /// Requested id
        id: i64,
    },

    /// Role name not present in the role templates
    #[error("Unknown role: {role}")]
    UnknownRole {
        /// Requested role
        role: String,
    },

    /// Permission id not present in the catalog
    #[error("Unknown permission: {permission}")]
    UnknownPermission {
        /// Requested permission id
        permission: String,
    },

    /// User already has a running timer
    #[error("User {user_id} already has a running timer (entry {entry_id})")]
    TimerAlreadyRunning {
        /// User id
        user_id: i64,
        /// Running entry
        entry_id: i64,
    },

    /// User has no running timer to stop
    #[error("User {user_id} has no running timer")]
    NoRunningTimer {
        /// User id
        user_id: i64,
    },

    /// Stop timestamp precedes start timestamp
    #[error("Time entry {entry_id} cannot end before it starts")]
    InvalidTimeRange {
        /// Entry id
        entry_id: i64,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
