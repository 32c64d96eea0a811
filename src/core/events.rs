//! Domain events emitted by invoice generation and payment recording.
//!
//! Delivery (e-mail, webhooks) happens elsewhere. Operations only hand the
//! event to an [`EventSink`] after their database transaction committed.

use crate::entities::invoice::InvoiceStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// Something a notification layer may want to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A recurring template produced a new invoice
    InvoiceGenerated {
        /// The new invoice
        invoice_id: i64,
        /// Template that produced it
        template_id: i64,
        /// Period date the invoice was issued for
        period: NaiveDate,
    },
    /// A payment or adjustment was appended to an invoice
    PaymentRecorded {
        /// Invoice paid against
        invoice_id: i64,
        /// The new payment record
        payment_id: i64,
        /// Signed amount of the record
        amount: Decimal,
        /// Invoice status after the record
        status: InvoiceStatus,
    },
}

/// Receiver of domain events
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not fail the operation that emitted it.
    fn publish(&self, event: &DomainEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &DomainEvent) {
        match event {
            DomainEvent::InvoiceGenerated {
                invoice_id,
                template_id,
                period,
            } => info!(invoice_id, template_id, %period, "Invoice generated"),
            DomainEvent::PaymentRecorded {
                invoice_id,
                payment_id,
                amount,
                status,
            } => info!(invoice_id, payment_id, %amount, %status, "Payment recorded"),
        }
    }
}
