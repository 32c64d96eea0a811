//! Outstanding balance reporting and plain-text formatting.
//!
//! The report functions return structured data; the `format_*` helpers turn
//! it into text suitable for logs and the command line.

use crate::{
    core::{
        payment::{self, PaymentSummary},
        totals::round_money,
    },
    entities::{
        Invoice,
        invoice::{self, InvoiceStatus},
    },
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::fmt::Write as _;

/// One sent or overdue invoice with money still owed
#[derive(Debug, Clone, Serialize)]
pub struct OutstandingInvoice {
    /// Invoice id
    pub invoice_id: i64,
    /// Human-readable number, e.g. `INV-00012`
    pub invoice_number: String,
    /// Billed client
    pub client_name: String,
    /// Current status
    pub status: InvoiceStatus,
    /// Due date
    pub due_date: NaiveDate,
    /// Payment position
    pub summary: PaymentSummary,
    /// Days after the due date, zero when not yet due
    pub days_past_due: i64,
}

/// Everything owed as of a date
#[derive(Debug, Clone, Serialize)]
pub struct OutstandingReport {
    /// Reporting date
    pub as_of: NaiveDate,
    /// Invoices with a positive remaining balance, oldest due date first
    pub invoices: Vec<OutstandingInvoice>,
    /// Sum of remaining balances
    pub total_outstanding: Decimal,
}

/// Lists sent and overdue invoices that still have a balance.
pub async fn outstanding_report<C>(db: &C, as_of: NaiveDate) -> Result<OutstandingReport>
where
    C: ConnectionTrait,
{
    let open = Invoice::find()
        .filter(invoice::Column::Status.is_in([InvoiceStatus::Sent, InvoiceStatus::Overdue]))
        .order_by_asc(invoice::Column::DueDate)
        .order_by_asc(invoice::Column::Id)
        .all(db)
        .await?;

    let mut invoices = Vec::with_capacity(open.len());
    for inv in open {
        let summary = payment::payment_summary(db, inv.id).await?;
        if summary.remaining_balance <= Decimal::ZERO {
            continue;
        }
        invoices.push(OutstandingInvoice {
            invoice_id: inv.id,
            invoice_number: inv.invoice_number,
            client_name: inv.client_name,
            status: inv.status,
            due_date: inv.due_date,
            summary,
            days_past_due: (as_of - inv.due_date).num_days().max(0),
        });
    }

    let total_outstanding = invoices
        .iter()
        .map(|i| i.summary.remaining_balance)
        .sum();

    Ok(OutstandingReport {
        as_of,
        invoices,
        total_outstanding,
    })
}

/// Formats an amount as dollars with thousands separators, e.g. `$1,234.50`.
#[must_use]
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let digits = format!("{:.2}", rounded.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

/// Share of the total that has been paid, as a percentage in `[0, 100]`.
///
/// An invoice with nothing to pay counts as fully paid.
#[must_use]
pub fn paid_percent(summary: &PaymentSummary) -> Decimal {
    if summary.total <= Decimal::ZERO {
        return Decimal::ONE_HUNDRED;
    }
    (summary.total_paid / summary.total * Decimal::ONE_HUNDRED)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Text progress bar of the paid share, e.g. `[████░░░░░░] 40.0% paid`.
#[must_use]
pub fn format_payment_progress(summary: &PaymentSummary, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let percent = paid_percent(summary);

    let filled = (percent * Decimal::from(length) / Decimal::ONE_HUNDRED)
        .round()
        .to_usize()
        .unwrap_or(0)
        .min(length);
    let empty = length - filled;

    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(empty);

    format!(
        "[{filled_str}{empty_str}] {:.1}% paid ({} of {})",
        percent,
        format_currency(summary.total_paid),
        format_currency(summary.total)
    )
}

/// Renders the report as one line per invoice plus a total line.
#[must_use]
pub fn format_outstanding_report(report: &OutstandingReport) -> String {
    let mut out = format!("Outstanding invoices as of {}\n", report.as_of);
    if report.invoices.is_empty() {
        out.push_str("Nothing outstanding.\n");
        return out;
    }

    for inv in &report.invoices {
        let overdue = if inv.days_past_due > 0 {
            format!(", {} days past due", inv.days_past_due)
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{} | {} | {} | due {}{} | {}",
            inv.invoice_number,
            inv.client_name,
            format_currency(inv.summary.remaining_balance),
            inv.due_date,
            overdue,
            format_payment_progress(&inv.summary, None)
        );
    }
    let _ = writeln!(
        out,
        "Total outstanding: {}",
        format_currency(report.total_outstanding)
    );
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{invoice as invoice_service, payment::PaymentStatus};
    use crate::test_utils::*;
    use chrono::Days;
    use rust_decimal_macros::dec;

    fn summary(total: Decimal, paid: Decimal) -> PaymentSummary {
        payment::summarize_payments(total, [paid])
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(0)), "$0.00");
        assert_eq!(format_currency(dec!(7150)), "$7,150.00");
        assert_eq!(format_currency(dec!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_currency(dec!(999.995)), "$1,000.00");
        assert_eq!(format_currency(dec!(-25.5)), "-$25.50");
        assert_eq!(format_currency(dec!(-0.001)), "$0.00");
    }

    #[test]
    fn test_format_payment_progress() {
        let partial = summary(dec!(7150), dec!(2860));
        assert_eq!(
            format_payment_progress(&partial, None),
            "[████░░░░░░] 40.0% paid ($2,860.00 of $7,150.00)"
        );

        let paid = summary(dec!(100), dec!(100));
        assert!(format_payment_progress(&paid, Some(5)).starts_with("[█████] 100.0%"));

        let unpaid = summary(dec!(100), dec!(0));
        assert!(format_payment_progress(&unpaid, Some(4)).starts_with("[░░░░] 0.0%"));
    }

    #[test]
    fn test_paid_percent_bounds() {
        assert_eq!(paid_percent(&summary(dec!(0), dec!(0))), dec!(100));
        assert_eq!(paid_percent(&summary(dec!(200), dec!(50))), dec!(25));
    }

    #[tokio::test]
    async fn test_outstanding_report() -> Result<()> {
        let (db, sent) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();

        // Drafts are not outstanding
        create_worked_example_invoice(&db).await?;

        payment::record_payment(&db, &events, sent.id, test_payment(dec!(5000))).await?;

        let as_of = sent.due_date.checked_add_days(Days::new(5)).unwrap();
        let report = outstanding_report(&db, as_of).await?;
        assert_eq!(report.invoices.len(), 1);
        let row = &report.invoices[0];
        assert_eq!(row.invoice_id, sent.id);
        assert_eq!(row.summary.remaining_balance, dec!(2150));
        assert_eq!(row.summary.status, PaymentStatus::Partial);
        assert_eq!(row.days_past_due, 5);
        assert_eq!(report.total_outstanding, dec!(2150));

        let text = format_outstanding_report(&report);
        assert!(text.contains(&sent.invoice_number));
        assert!(text.contains("5 days past due"));
        assert!(text.contains("Total outstanding: $2,150.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_paid_invoices_leave_the_report() -> Result<()> {
        let (db, sent) = setup_with_sent_invoice().await?;
        let events = RecordingEventSink::default();
        payment::record_payment(&db, &events, sent.id, test_payment(dec!(7150))).await?;

        let report = outstanding_report(&db, sent.issue_date).await?;
        assert!(report.invoices.is_empty());
        assert_eq!(report.total_outstanding, Decimal::ZERO);
        assert!(format_outstanding_report(&report).contains("Nothing outstanding."));

        let details = invoice_service::get_invoice_details(&db, sent.id).await?;
        assert_eq!(details.invoice.status, InvoiceStatus::Paid);
        Ok(())
    }
}
