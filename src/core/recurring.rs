//! Recurring invoice templates and invoice generation.
//!
//! Generating an invoice advances the template by exactly one period. The
//! advance is a compare-and-set on the expected period date, executed in the
//! same transaction as the invoice insert, so repeated or concurrent calls
//! for one period produce a single invoice.

use crate::{
    config::settings::AppSettings,
    core::{
        events::{DomainEvent, EventSink},
        invoice::{self, NewInvoice, NewLineItem},
        schedule,
        totals::Discount,
    },
    entities::{
        RecurringTemplate, invoice as invoice_entity,
        recurring_template::{self, Frequency},
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Days, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

/// Input for a new recurring template
#[derive(Debug, Clone)]
pub struct NewRecurringTemplate {
    /// Invoice whose content is copied on every generation
    pub source_invoice_id: i64,
    /// Generation frequency
    pub frequency: Frequency,
    /// Issue date of the first generated invoice
    pub first_invoice_date: NaiveDate,
    /// Days until due; falls back to the configured default
    pub payment_terms_days: Option<i32>,
}

/// Result of one successful generation
#[derive(Debug, Clone)]
pub struct GeneratedInvoice {
    /// The new draft invoice
    pub invoice: invoice_entity::Model,
    /// Template after the advance
    pub template: recurring_template::Model,
    /// Period the invoice was generated for
    pub period: NaiveDate,
}

/// Outcome of a [`process_due_templates`] run
#[derive(Debug, Clone, Default)]
pub struct RecurringRunSummary {
    /// Invoices generated in this run
    pub generated: Vec<GeneratedInvoice>,
    /// Templates whose period had already been generated
    pub skipped: Vec<i64>,
    /// Templates that failed, with the error message
    pub failed: Vec<(i64, String)>,
}

/// Fetches a template or fails with [`Error::TemplateNotFound`].
pub async fn get_template<C>(db: &C, template_id: i64) -> Result<recurring_template::Model>
where
    C: ConnectionTrait,
{
    RecurringTemplate::find_by_id(template_id)
        .one(db)
        .await?
        .ok_or(Error::TemplateNotFound { id: template_id })
}

/// All templates, oldest first.
pub async fn list_templates<C>(db: &C) -> Result<Vec<recurring_template::Model>>
where
    C: ConnectionTrait,
{
    RecurringTemplate::find()
        .order_by_asc(recurring_template::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates an active template from an existing invoice.
#[instrument(skip(db, settings))]
pub async fn create_template(
    db: &DatabaseConnection,
    settings: &AppSettings,
    new: NewRecurringTemplate,
) -> Result<recurring_template::Model> {
    invoice::get_invoice(db, new.source_invoice_id).await?;

    let payment_terms_days = new
        .payment_terms_days
        .unwrap_or(settings.default_payment_terms_days);
    if payment_terms_days < 0 {
        return Err(Error::Config {
            message: format!("Payment terms cannot be negative: {payment_terms_days}"),
        });
    }

    let template = recurring_template::ActiveModel {
        source_invoice_id: Set(new.source_invoice_id),
        frequency: Set(new.frequency),
        next_invoice_date: Set(new.first_invoice_date),
        anchor_day: Set(i32::try_from(new.first_invoice_date.day())?),
        is_active: Set(true),
        total_generated: Set(0),
        last_generated_for: Set(None),
        payment_terms_days: Set(payment_terms_days),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        template_id = template.id,
        frequency = ?template.frequency,
        next = %template.next_invoice_date,
        "Recurring template created"
    );
    Ok(template)
}

/// Pauses or resumes a template.
#[instrument(skip(db))]
pub async fn set_template_active(
    db: &DatabaseConnection,
    template_id: i64,
    is_active: bool,
) -> Result<recurring_template::Model> {
    let template = get_template(db, template_id).await?;
    let mut active: recurring_template::ActiveModel = template.into();
    active.is_active = Set(is_active);
    active.update(db).await.map_err(Into::into)
}

/// Date following `period` for this template.
pub fn following_period(template: &recurring_template::Model, period: NaiveDate) -> Result<NaiveDate> {
    let anchor_day = u32::try_from(template.anchor_day)?;
    schedule::next_occurrence_anchored(template.frequency, period, anchor_day).ok_or_else(|| {
        Error::Config {
            message: format!("Next occurrence after {period} is out of range"),
        }
    })
}

/// Moves the template from `period` on to `next`.
///
/// The update only matches while `next_invoice_date` still equals `period`,
/// so of two callers racing on the same period exactly one advances it.
pub(crate) async fn advance_template<C>(
    db: &C,
    template_id: i64,
    period: NaiveDate,
    next: NaiveDate,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let advanced = RecurringTemplate::update_many()
        .col_expr(recurring_template::Column::NextInvoiceDate, Expr::value(next))
        .col_expr(
            recurring_template::Column::TotalGenerated,
            Expr::col(recurring_template::Column::TotalGenerated).add(1),
        )
        .col_expr(
            recurring_template::Column::LastGeneratedFor,
            Expr::value(Some(period)),
        )
        .filter(recurring_template::Column::Id.eq(template_id))
        .filter(recurring_template::Column::NextInvoiceDate.eq(period))
        .exec(db)
        .await?;
    if advanced.rows_affected == 0 {
        return Err(Error::AlreadyGenerated {
            id: template_id,
            period,
        });
    }
    Ok(())
}

/// Generates the invoice for the template's current period.
///
/// Fails with [`Error::TemplateInactive`] for paused templates,
/// [`Error::TemplateNotDue`] before the scheduled date and
/// [`Error::AlreadyGenerated`] when another call already advanced past this
/// period. Nothing is written in any of those cases.
///
/// # Arguments
/// * `db` - Database connection; the advance and the new invoice commit together
/// * `events` - Sink notified with [`DomainEvent::InvoiceGenerated`] after commit
/// * `template_id` - Template to generate from
/// * `as_of` - Current date; the template's period must not be after it
///
/// # Returns
/// The new draft invoice, the period it covers and the advanced template.
#[instrument(skip(db, events))]
pub async fn generate_from_template(
    db: &DatabaseConnection,
    events: &dyn EventSink,
    template_id: i64,
    as_of: NaiveDate,
) -> Result<GeneratedInvoice> {
    let txn = db.begin().await?;

    let template = get_template(&txn, template_id).await?;
    if !template.is_active {
        return Err(Error::TemplateInactive { id: template_id });
    }
    let period = template.next_invoice_date;
    if period > as_of {
        return Err(Error::TemplateNotDue {
            id: template_id,
            next_date: period,
            as_of,
        });
    }
    if template.last_generated_for == Some(period) {
        return Err(Error::AlreadyGenerated {
            id: template_id,
            period,
        });
    }

    let next = following_period(&template, period)?;
    advance_template(&txn, template_id, period, next).await?;

    let source = invoice::get_invoice(&txn, template.source_invoice_id).await?;
    let source_items = invoice::get_line_items(&txn, source.id).await?;
    let terms = u64::try_from(template.payment_terms_days)?;
    let due_date = period
        .checked_add_days(Days::new(terms))
        .ok_or_else(|| Error::Config {
            message: format!("Due date {terms} days after {period} is out of range"),
        })?;

    let generated = invoice::insert_invoice(
        &txn,
        NewInvoice {
            client_name: source.client_name.clone(),
            issue_date: period,
            due_date,
            discount: Discount::from_parts(source.discount_type, source.discount_value),
            tax_rate: source.tax_rate,
            notes: source.notes.clone(),
        },
        Some(template_id),
    )
    .await?;

    for item in source_items {
        invoice::insert_line_item(
            &txn,
            generated.id,
            NewLineItem {
                description: item.description,
                quantity: item.quantity,
                rate: item.rate,
                taxable: item.taxable,
                category: item.category,
            },
        )
        .await?;
    }

    let template = get_template(&txn, template_id).await?;
    txn.commit().await?;

    events.publish(&DomainEvent::InvoiceGenerated {
        invoice_id: generated.id,
        template_id,
        period,
    });

    Ok(GeneratedInvoice {
        invoice: generated,
        template,
        period,
    })
}

/// Generates one invoice for every active template that is due on `as_of`.
///
/// A template that fell several periods behind catches up one period per
/// run. Failures are collected and do not stop the remaining templates.
#[instrument(skip(db, events))]
pub async fn process_due_templates(
    db: &DatabaseConnection,
    events: &dyn EventSink,
    as_of: NaiveDate,
) -> Result<RecurringRunSummary> {
    let due = RecurringTemplate::find()
        .filter(recurring_template::Column::IsActive.eq(true))
        .filter(recurring_template::Column::NextInvoiceDate.lte(as_of))
        .order_by_asc(recurring_template::Column::Id)
        .all(db)
        .await?;

    let mut summary = RecurringRunSummary::default();
    for template in due {
        match generate_from_template(db, events, template.id, as_of).await {
            Ok(generated) => summary.generated.push(generated),
            Err(Error::AlreadyGenerated { id, .. }) => summary.skipped.push(id),
            Err(e) => {
                warn!(template_id = template.id, error = %e, "Recurring generation failed");
                summary.failed.push((template.id, e.to_string()));
            }
        }
    }

    info!(
        generated = summary.generated.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        %as_of,
        "Recurring invoices processed"
    );
    Ok(summary)
}
