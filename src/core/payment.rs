//! Payment reconciliation - recording payments against invoices.
//!
//! Payment history is append-only. A payment may never exceed the remaining
//! balance; this is enforced inside the same database transaction that
//! inserts the record, not only at the form. Mistakes are corrected with an
//! adjustment, a negative record that offsets earlier payments.

use crate::{
    core::{
        events::{DomainEvent, EventSink},
        invoice,
    },
    entities::{
        Payment,
        invoice::{InvoiceStatus, Model as InvoiceModel},
        payment::{self, PaymentKind, PaymentMethod},
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument};

/// Where an invoice stands with respect to its total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing paid yet
    Unpaid,
    /// Something paid, something still owed
    Partial,
    /// Remaining balance is zero or below
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unpaid => "unpaid",
            Self::Partial => "partially paid",
            Self::Paid => "fully paid",
        })
    }
}

/// Payment figures derived from an invoice total and its history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    /// Invoice total the payments are measured against
    pub total: Decimal,
    /// Sum of all payment and adjustment amounts
    pub total_paid: Decimal,
    /// `total - total_paid`
    pub remaining_balance: Decimal,
    /// Three-way status
    pub status: PaymentStatus,
}

/// Reconciles a list of signed amounts against `total`.
pub fn summarize_payments<I>(total: Decimal, amounts: I) -> PaymentSummary
where
    I: IntoIterator<Item = Decimal>,
{
    let total_paid: Decimal = amounts.into_iter().sum();
    let remaining_balance = total - total_paid;

    let status = if remaining_balance <= Decimal::ZERO {
        PaymentStatus::Paid
    } else if total_paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    PaymentSummary {
        total,
        total_paid,
        remaining_balance,
        status,
    }
}

/// Details of money received or reversed
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Amount, always positive; adjustments store it negated
    pub amount: Decimal,
    /// Date the money moved
    pub payment_date: NaiveDate,
    /// Transfer method
    pub method: PaymentMethod,
    /// Bank reference, cheque number and the like
    pub reference: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
}

/// Outcome of appending a record
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// The stored record
    pub payment: payment::Model,
    /// Reconciliation after the record
    pub summary: PaymentSummary,
    /// Invoice status after the record
    pub invoice_status: InvoiceStatus,
}

/// Payment history of an invoice in recorded order.
pub async fn list_payments<C>(db: &C, invoice_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Current reconciliation of one invoice.
pub async fn payment_summary<C>(db: &C, invoice_id: i64) -> Result<PaymentSummary>
where
    C: ConnectionTrait,
{
    let invoice = invoice::get_invoice(db, invoice_id).await?;
    current_summary(db, &invoice).await
}

async fn current_summary<C>(db: &C, invoice: &InvoiceModel) -> Result<PaymentSummary>
where
    C: ConnectionTrait,
{
    let totals = invoice::compute_totals(db, invoice).await?;
    let history = list_payments(db, invoice.id).await?;
    Ok(summarize_payments(
        totals.total,
        history.iter().map(|p| p.amount),
    ))
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            field: "payment amount",
            value: amount,
        });
    }
    Ok(())
}

/// Invoice status implied by a reconciliation.
///
/// Paid when the balance is settled; otherwise overdue once `today` is past
/// the due date, else sent.
#[must_use]
pub fn status_for(invoice: &InvoiceModel, summary: &PaymentSummary, today: NaiveDate) -> InvoiceStatus {
    if summary.status == PaymentStatus::Paid {
        InvoiceStatus::Paid
    } else if invoice.status == InvoiceStatus::Overdue || invoice.due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Sent
    }
}

async fn append_record<C>(
    db: &C,
    invoice_id: i64,
    kind: PaymentKind,
    signed_amount: Decimal,
    details: NewPayment,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    payment::ActiveModel {
        invoice_id: Set(invoice_id),
        kind: Set(kind),
        amount: Set(signed_amount),
        payment_date: Set(details.payment_date),
        method: Set(details.method),
        reference: Set(details.reference),
        notes: Set(details.notes),
        recorded_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Records a payment against a sent or overdue invoice.
///
/// The amount must be positive and no larger than the remaining balance at
/// the moment of entry. When the balance reaches zero the invoice becomes
/// paid. A [`DomainEvent::PaymentRecorded`] is published after commit.
///
/// # Arguments
/// * `db` - Database connection; the record and status change share one transaction
/// * `events` - Sink notified once the payment is committed
/// * `invoice_id` - Invoice being paid
/// * `details` - Amount, date and method of the payment. A partial payment
///   dated after the due date leaves the invoice overdue.
///
/// # Returns
/// The stored payment, the reconciled summary and the invoice's new status.
///
/// # Errors
/// * `InvalidAmount` if the amount is zero or negative
/// * `InvoiceNotPayable` unless the invoice is sent or overdue
/// * `Overpayment` if the amount exceeds the remaining balance
#[instrument(skip(db, events, details), fields(amount = %details.amount))]
pub async fn record_payment(
    db: &DatabaseConnection,
    events: &dyn EventSink,
    invoice_id: i64,
    details: NewPayment,
) -> Result<PaymentOutcome> {
    ensure_positive(details.amount)?;

    let txn = db.begin().await?;
    let invoice = invoice::get_invoice(&txn, invoice_id).await?;
    if !matches!(invoice.status, InvoiceStatus::Sent | InvoiceStatus::Overdue) {
        return Err(Error::InvoiceNotPayable {
            id: invoice_id,
            status: invoice.status,
        });
    }

    let before = current_summary(&txn, &invoice).await?;
    if details.amount > before.remaining_balance {
        return Err(Error::Overpayment {
            amount: details.amount,
            remaining: before.remaining_balance,
        });
    }

    let amount = details.amount;
    let paid_on = details.payment_date;
    let payment = append_record(&txn, invoice_id, PaymentKind::Payment, amount, details).await?;
    let summary = summarize_payments(before.total, [before.total_paid, amount]);

    let target = status_for(&invoice, &summary, paid_on);
    let invoice = invoice::transition(&txn, invoice, target).await?;
    txn.commit().await?;

    info!(
        invoice_id,
        payment_id = payment.id,
        remaining = %summary.remaining_balance,
        status = %summary.status,
        "Payment recorded"
    );
    events.publish(&DomainEvent::PaymentRecorded {
        invoice_id,
        payment_id: payment.id,
        amount,
        status: invoice.status,
    });

    Ok(PaymentOutcome {
        payment,
        summary,
        invoice_status: invoice.status,
    })
}

/// Appends an offsetting record that reverses `details.amount` of earlier
/// payments.
///
/// The reversal cannot exceed what has been paid. A paid invoice whose
/// balance reopens falls back to sent, or overdue when past its due date.
#[instrument(skip(db, events, details), fields(amount = %details.amount))]
pub async fn record_adjustment(
    db: &DatabaseConnection,
    events: &dyn EventSink,
    invoice_id: i64,
    details: NewPayment,
) -> Result<PaymentOutcome> {
    ensure_positive(details.amount)?;

    let txn = db.begin().await?;
    let invoice = invoice::get_invoice(&txn, invoice_id).await?;
    if invoice.status == InvoiceStatus::Draft {
        return Err(Error::InvoiceNotPayable {
            id: invoice_id,
            status: invoice.status,
        });
    }

    let before = current_summary(&txn, &invoice).await?;
    let signed = -details.amount;
    if details.amount > before.total_paid {
        return Err(Error::AdjustmentExceedsPaid {
            amount: signed,
            total_paid: before.total_paid,
        });
    }

    let adjusted_on = details.payment_date;
    let payment =
        append_record(&txn, invoice_id, PaymentKind::Adjustment, signed, details).await?;
    let summary = summarize_payments(before.total, [before.total_paid, signed]);

    let target = status_for(&invoice, &summary, adjusted_on);
    let invoice = invoice::transition(&txn, invoice, target).await?;
    txn.commit().await?;

    info!(
        invoice_id,
        payment_id = payment.id,
        remaining = %summary.remaining_balance,
        status = %invoice.status,
        "Payment adjustment recorded"
    );
    events.publish(&DomainEvent::PaymentRecorded {
        invoice_id,
        payment_id: payment.id,
        amount: signed,
        status: invoice.status,
    });

    Ok(PaymentOutcome {
        payment,
        summary,
        invoice_status: invoice.status,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summarize_worked_example() {
        let summary = summarize_payments(dec!(7150), [dec!(5000), dec!(2150)]);
        assert_eq!(summary.total_paid, dec!(7150));
        assert_eq!(summary.remaining_balance, dec!(0));
        assert_eq!(summary.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_summarize_thresholds() {
        let unpaid = summarize_payments(dec!(100), []);
        assert_eq!(unpaid.status, PaymentStatus::Unpaid);
        assert_eq!(unpaid.remaining_balance, dec!(100));

        let partial = summarize_payments(dec!(100), [dec!(40)]);
        assert_eq!(partial.status, PaymentStatus::Partial);
        assert_eq!(partial.remaining_balance, dec!(60));

        let reversed = summarize_payments(dec!(100), [dec!(40), dec!(-40)]);
        assert_eq!(reversed.status, PaymentStatus::Unpaid);
        assert_eq!(reversed.total_paid, dec!(0));

        // A zero total has nothing left to pay
        assert_eq!(summarize_payments(dec!(0), []).status, PaymentStatus::Paid);
    }

    #[test]
    fn test_summary_identity_over_sequences() {
        let sequences: [&[Decimal]; 4] = [
            &[],
            &[dec!(0.01)],
            &[dec!(10), dec!(20.50), dec!(-5)],
            &[dec!(99.99), dec!(0.01)],
        ];
        for amounts in sequences {
            let summary = summarize_payments(dec!(100), amounts.iter().copied());
            let expected: Decimal = amounts.iter().sum();
            assert_eq!(summary.total_paid, expected);
            assert_eq!(summary.remaining_balance, dec!(100) - expected);
            let expected_status = if summary.remaining_balance <= Decimal::ZERO {
                PaymentStatus::Paid
            } else if expected > Decimal::ZERO {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Unpaid
            };
            assert_eq!(summary.status, expected_status);
        }
    }

    #[tokio::test]
    async fn test_payments_settle_invoice() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();

        let first = record_payment(&db, &events, invoice.id, test_payment(dec!(5000))).await?;
        assert_eq!(first.summary.status, PaymentStatus::Partial);
        assert_eq!(first.summary.remaining_balance, dec!(2150));
        assert_eq!(first.invoice_status, InvoiceStatus::Sent);

        let second = record_payment(&db, &events, invoice.id, test_payment(dec!(2150))).await?;
        assert_eq!(second.summary.total_paid, dec!(7150));
        assert_eq!(second.summary.remaining_balance, dec!(0));
        assert_eq!(second.summary.status, PaymentStatus::Paid);
        assert_eq!(second.invoice_status, InvoiceStatus::Paid);

        let stored = payment_summary(&db, invoice.id).await?;
        assert_eq!(stored, second.summary);

        let recorded = events.events();
        assert_eq!(recorded.len(), 2);
        assert!(matches!(
            recorded[1],
            DomainEvent::PaymentRecorded {
                status: InvoiceStatus::Paid,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_overpayment_is_rejected_and_not_stored() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();

        record_payment(&db, &events, invoice.id, test_payment(dec!(7000))).await?;
        let result = record_payment(&db, &events, invoice.id, test_payment(dec!(150.01))).await;
        assert!(matches!(
            result,
            Err(Error::Overpayment { remaining, .. }) if remaining == dec!(150)
        ));

        assert_eq!(list_payments(&db, invoice.id).await?.len(), 1);
        assert_eq!(events.events().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_validation() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();

        let result = record_payment(&db, &events, invoice.id, test_payment(dec!(0))).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = record_payment(&db, &events, invoice.id, test_payment(dec!(-10))).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let draft = create_worked_example_invoice(&db).await?;
        let result = record_payment(&db, &events, draft.id, test_payment(dec!(10))).await;
        assert!(matches!(
            result,
            Err(Error::InvoiceNotPayable {
                status: InvoiceStatus::Draft,
                ..
            })
        ));

        let result = record_payment(&db, &events, 9999, test_payment(dec!(10))).await;
        assert!(matches!(result, Err(Error::InvoiceNotFound { id: 9999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_paid_invoice_rejects_further_payments() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();
        record_payment(&db, &events, invoice.id, test_payment(dec!(7150))).await?;

        let result = record_payment(&db, &events, invoice.id, test_payment(dec!(1))).await;
        assert!(matches!(
            result,
            Err(Error::InvoiceNotPayable {
                status: InvoiceStatus::Paid,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjustment_reopens_paid_invoice() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();
        record_payment(&db, &events, invoice.id, test_payment(dec!(7150))).await?;

        let outcome = record_adjustment(&db, &events, invoice.id, test_payment(dec!(150))).await?;
        assert_eq!(outcome.payment.kind, PaymentKind::Adjustment);
        assert_eq!(outcome.payment.amount, dec!(-150));
        assert_eq!(outcome.summary.total_paid, dec!(7000));
        assert_eq!(outcome.summary.status, PaymentStatus::Partial);
        assert_ne!(outcome.invoice_status, InvoiceStatus::Paid);

        // The original payment is untouched
        let history = list_payments(&db, invoice.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, dec!(7150));
        assert_eq!(history[0].kind, PaymentKind::Payment);
        Ok(())
    }

    #[tokio::test]
    async fn test_adjustment_cannot_exceed_paid() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();
        record_payment(&db, &events, invoice.id, test_payment(dec!(100))).await?;

        let result = record_adjustment(&db, &events, invoice.id, test_payment(dec!(100.01))).await;
        assert!(matches!(result, Err(Error::AdjustmentExceedsPaid { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_on_overdue_invoice_stays_overdue_until_paid() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();
        invoice::mark_overdue_invoices(&db, invoice.due_date.succ_opt().unwrap()).await?;

        let partial = record_payment(&db, &events, invoice.id, test_payment(dec!(100))).await?;
        assert_eq!(partial.invoice_status, InvoiceStatus::Overdue);

        let rest = record_payment(&db, &events, invoice.id, test_payment(dec!(7050))).await?;
        assert_eq!(rest.invoice_status, InvoiceStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_late_partial_payment_uses_payment_date() -> Result<()> {
        let (db, invoice) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();

        let mut late = test_payment(dec!(100));
        late.payment_date = invoice.due_date.succ_opt().unwrap();
        let outcome = record_payment(&db, &events, invoice.id, late).await?;
        assert_eq!(outcome.invoice_status, InvoiceStatus::Overdue);

        let mut on_time = test_payment(dec!(7050));
        on_time.payment_date = invoice.due_date;
        let outcome = record_payment(&db, &events, invoice.id, on_time).await?;
        assert_eq!(outcome.invoice_status, InvoiceStatus::Paid);
        Ok(())
    }
}
