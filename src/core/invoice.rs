//! Invoice business logic - drafting, editing and sending invoices.
//!
//! Line item content and totals inputs can only change while an invoice is a
//! draft. Totals are never written to the database; every read derives them
//! again from the current line items.

use crate::{
    core::{
        payment::{self, PaymentStatus, PaymentSummary},
        totals::{self, Discount, InvoiceTotals, LineAmount},
    },
    entities::{
        Invoice, LineItem, Payment,
        invoice::{self, InvoiceStatus},
        line_item, payment as payment_entity,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Input for drafting a new invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Name of the billed client
    pub client_name: String,
    /// Issue date
    pub issue_date: NaiveDate,
    /// Due date, on or after the issue date
    pub due_date: NaiveDate,
    /// Discount applied before tax
    pub discount: Discount,
    /// Tax rate in percent
    pub tax_rate: Decimal,
    /// Free-form notes
    pub notes: Option<String>,
}

/// Input for a new line item
#[derive(Debug, Clone)]
pub struct NewLineItem {
    /// What is being billed
    pub description: String,
    /// Number of units, at least 1
    pub quantity: i32,
    /// Price per unit, not negative
    pub rate: Decimal,
    /// Whether the item is subject to tax
    pub taxable: bool,
    /// Grouping label
    pub category: String,
}

/// Partial update of a line item; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct LineItemUpdate {
    /// New description
    pub description: Option<String>,
    /// New quantity
    pub quantity: Option<i32>,
    /// New rate
    pub rate: Option<Decimal>,
    /// New taxable flag
    pub taxable: Option<bool>,
    /// New category
    pub category: Option<String>,
}

/// An invoice with everything derived from it
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    /// The stored invoice row
    pub invoice: invoice::Model,
    /// Line items in display order
    pub line_items: Vec<line_item::Model>,
    /// Payment history in recorded order
    pub payments: Vec<payment_entity::Model>,
    /// Totals derived from the line items
    pub totals: InvoiceTotals,
    /// Payment reconciliation against `totals.total`
    pub payment_summary: PaymentSummary,
}

/// Fetches an invoice or fails with [`Error::InvoiceNotFound`].
pub async fn get_invoice<C>(db: &C, invoice_id: i64) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })
}

/// Line items of an invoice in display order.
pub async fn get_line_items<C>(db: &C, invoice_id: i64) -> Result<Vec<line_item::Model>>
where
    C: ConnectionTrait,
{
    LineItem::find()
        .filter(line_item::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(line_item::Column::Position)
        .order_by_asc(line_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Derives the totals of an already loaded invoice.
pub async fn compute_totals<C>(db: &C, invoice: &invoice::Model) -> Result<InvoiceTotals>
where
    C: ConnectionTrait,
{
    let items = get_line_items(db, invoice.id).await?;
    totals_for(invoice, &items)
}

/// Totals of `invoice` over the given line items.
pub fn totals_for(invoice: &invoice::Model, items: &[line_item::Model]) -> Result<InvoiceTotals> {
    let amounts: Vec<LineAmount> = items.iter().map(LineAmount::from).collect();
    totals::calculate_totals(
        &amounts,
        Discount::from_parts(invoice.discount_type, invoice.discount_value),
        invoice.tax_rate,
    )
}

/// Loads an invoice together with its items, payments and derived figures.
pub async fn get_invoice_details<C>(db: &C, invoice_id: i64) -> Result<InvoiceDetails>
where
    C: ConnectionTrait,
{
    let invoice = get_invoice(db, invoice_id).await?;
    let line_items = get_line_items(db, invoice_id).await?;
    let payments = payment::list_payments(db, invoice_id).await?;

    let totals = totals_for(&invoice, &line_items)?;
    let payment_summary =
        payment::summarize_payments(totals.total, payments.iter().map(|p| p.amount));

    Ok(InvoiceDetails {
        invoice,
        line_items,
        payments,
        totals,
        payment_summary,
    })
}

/// Lists invoices, optionally restricted to one status, oldest first.
pub async fn list_invoices<C>(db: &C, status: Option<InvoiceStatus>) -> Result<Vec<invoice::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Invoice::find().order_by_asc(invoice::Column::Id);
    if let Some(status) = status {
        query = query.filter(invoice::Column::Status.eq(status));
    }
    query.all(db).await.map_err(Into::into)
}

fn validate_new_invoice(new: &NewInvoice) -> Result<()> {
    if new.client_name.trim().is_empty() {
        return Err(Error::EmptyField {
            field: "Client name",
        });
    }
    if new.due_date < new.issue_date {
        return Err(Error::InvalidDueDate {
            issue_date: new.issue_date,
            due_date: new.due_date,
        });
    }
    totals::validate_discount(new.discount)?;
    totals::validate_tax_rate(new.tax_rate)
}

fn validate_new_line_item(item: &NewLineItem) -> Result<()> {
    if item.description.trim().is_empty() {
        return Err(Error::EmptyField {
            field: "Line item description",
        });
    }
    totals::validate_line_item(item.quantity, item.rate)
}

/// Inserts a draft invoice and assigns its number. Runs on whatever
/// connection or transaction it is given.
pub(crate) async fn insert_invoice<C>(
    db: &C,
    new: NewInvoice,
    recurring_template_id: Option<i64>,
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    validate_new_invoice(&new)?;
    let (discount_type, discount_value) = new.discount.into_parts();

    let inserted = invoice::ActiveModel {
        invoice_number: Set(String::new()),
        client_name: Set(new.client_name.trim().to_string()),
        status: Set(InvoiceStatus::Draft),
        discount_type: Set(discount_type),
        discount_value: Set(discount_value),
        tax_rate: Set(new.tax_rate),
        issue_date: Set(new.issue_date),
        due_date: Set(new.due_date),
        notes: Set(new.notes),
        recurring_template_id: Set(recurring_template_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let invoice_number = format_invoice_number(inserted.id);
    let mut active: invoice::ActiveModel = inserted.into();
    active.invoice_number = Set(invoice_number);
    active.update(db).await.map_err(Into::into)
}

/// `INV-` followed by the zero padded id
#[must_use]
pub fn format_invoice_number(id: i64) -> String {
    format!("INV-{id:05}")
}

/// Drafts a new invoice with no line items.
#[instrument(skip(db, new), fields(client = %new.client_name))]
pub async fn create_invoice(db: &DatabaseConnection, new: NewInvoice) -> Result<invoice::Model> {
    let txn = db.begin().await?;
    let invoice = insert_invoice(&txn, new, None).await?;
    txn.commit().await?;

    info!(invoice_id = invoice.id, number = %invoice.invoice_number, "Invoice drafted");
    Ok(invoice)
}

fn ensure_draft(invoice: &invoice::Model) -> Result<()> {
    match invoice.status {
        InvoiceStatus::Draft => Ok(()),
        status => Err(Error::InvoiceLocked {
            id: invoice.id,
            status,
        }),
    }
}

pub(crate) async fn insert_line_item<C>(
    db: &C,
    invoice_id: i64,
    item: NewLineItem,
) -> Result<line_item::Model>
where
    C: ConnectionTrait,
{
    validate_new_line_item(&item)?;

    let next_position = LineItem::find()
        .filter(line_item::Column::InvoiceId.eq(invoice_id))
        .order_by_desc(line_item::Column::Position)
        .one(db)
        .await?
        .map_or(0, |last| last.position + 1);

    line_item::ActiveModel {
        invoice_id: Set(invoice_id),
        position: Set(next_position),
        description: Set(item.description.trim().to_string()),
        quantity: Set(item.quantity),
        rate: Set(item.rate),
        taxable: Set(item.taxable),
        category: Set(item.category),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Appends a line item to a draft invoice.
#[instrument(skip(db, item))]
pub async fn add_line_item(
    db: &DatabaseConnection,
    invoice_id: i64,
    item: NewLineItem,
) -> Result<line_item::Model> {
    let invoice = get_invoice(db, invoice_id).await?;
    ensure_draft(&invoice)?;

    let created = insert_line_item(db, invoice_id, item).await?;
    debug!(line_item_id = created.id, amount = ?created.amount(), "Line item added");
    Ok(created)
}

async fn get_line_item<C>(db: &C, invoice_id: i64, line_item_id: i64) -> Result<line_item::Model>
where
    C: ConnectionTrait,
{
    LineItem::find_by_id(line_item_id)
        .filter(line_item::Column::InvoiceId.eq(invoice_id))
        .one(db)
        .await?
        .ok_or(Error::LineItemNotFound {
            invoice_id,
            line_item_id,
        })
}

/// Changes fields of a line item on a draft invoice.
///
/// The amount follows automatically because it is always recomputed from
/// quantity and rate.
#[instrument(skip(db, update))]
pub async fn update_line_item(
    db: &DatabaseConnection,
    invoice_id: i64,
    line_item_id: i64,
    update: LineItemUpdate,
) -> Result<line_item::Model> {
    let invoice = get_invoice(db, invoice_id).await?;
    ensure_draft(&invoice)?;
    let existing = get_line_item(db, invoice_id, line_item_id).await?;

    let quantity = update.quantity.unwrap_or(existing.quantity);
    let rate = update.rate.unwrap_or(existing.rate);
    totals::validate_line_item(quantity, rate)?;
    if update
        .description
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        return Err(Error::EmptyField {
            field: "Line item description",
        });
    }

    let mut active: line_item::ActiveModel = existing.into();
    active.quantity = Set(quantity);
    active.rate = Set(rate);
    if let Some(description) = update.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(taxable) = update.taxable {
        active.taxable = Set(taxable);
    }
    if let Some(category) = update.category {
        active.category = Set(category);
    }
    active.update(db).await.map_err(Into::into)
}

/// Removes a line item from a draft invoice.
#[instrument(skip(db))]
pub async fn remove_line_item(
    db: &DatabaseConnection,
    invoice_id: i64,
    line_item_id: i64,
) -> Result<()> {
    let invoice = get_invoice(db, invoice_id).await?;
    ensure_draft(&invoice)?;
    let existing = get_line_item(db, invoice_id, line_item_id).await?;
    existing.delete(db).await?;
    Ok(())
}

/// Replaces the discount of a draft invoice.
///
/// A fixed discount larger than the current subtotal is rejected here; the
/// calculator still clamps if items are removed afterwards.
#[instrument(skip(db))]
pub async fn set_discount(
    db: &DatabaseConnection,
    invoice_id: i64,
    discount: Discount,
) -> Result<invoice::Model> {
    let invoice = get_invoice(db, invoice_id).await?;
    ensure_draft(&invoice)?;
    let current = compute_totals(db, &invoice).await?;
    totals::validate_discount_against(discount, current.subtotal)?;

    let (discount_type, discount_value) = discount.into_parts();
    let mut active: invoice::ActiveModel = invoice.into();
    active.discount_type = Set(discount_type);
    active.discount_value = Set(discount_value);
    active.update(db).await.map_err(Into::into)
}

/// Replaces the tax rate of a draft invoice.
#[instrument(skip(db))]
pub async fn set_tax_rate(
    db: &DatabaseConnection,
    invoice_id: i64,
    tax_rate: Decimal,
) -> Result<invoice::Model> {
    totals::validate_tax_rate(tax_rate)?;
    let invoice = get_invoice(db, invoice_id).await?;
    ensure_draft(&invoice)?;

    let mut active: invoice::ActiveModel = invoice.into();
    active.tax_rate = Set(tax_rate);
    active.update(db).await.map_err(Into::into)
}

/// Moves an invoice to `to` if the lifecycle allows it.
pub(crate) async fn transition<C>(
    db: &C,
    invoice: invoice::Model,
    to: InvoiceStatus,
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    if invoice.status == to {
        return Ok(invoice);
    }
    if !invoice.status.can_transition_to(to) {
        return Err(Error::InvalidStatusTransition {
            from: invoice.status,
            to,
        });
    }
    let mut active: invoice::ActiveModel = invoice.into();
    active.status = Set(to);
    active.update(db).await.map_err(Into::into)
}

/// Sends a draft invoice. Invoices without line items cannot be sent.
///
/// An invoice whose total is zero has nothing to collect and moves straight
/// on to paid.
#[instrument(skip(db))]
pub async fn send_invoice(db: &DatabaseConnection, invoice_id: i64) -> Result<invoice::Model> {
    let txn = db.begin().await?;
    let invoice = get_invoice(&txn, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(Error::InvalidStatusTransition {
            from: invoice.status,
            to: InvoiceStatus::Sent,
        });
    }
    let items = get_line_items(&txn, invoice_id).await?;
    if items.is_empty() {
        return Err(Error::EmptyInvoice { id: invoice_id });
    }
    let totals = totals_for(&invoice, &items)?;

    let mut sent = transition(&txn, invoice, InvoiceStatus::Sent).await?;
    if totals.total <= Decimal::ZERO {
        sent = transition(&txn, sent, InvoiceStatus::Paid).await?;
    }
    txn.commit().await?;

    info!(invoice_id, number = %sent.invoice_number, status = %sent.status, "Invoice sent");
    Ok(sent)
}

/// Marks every sent invoice whose due date is before `as_of` as overdue.
///
/// A sent invoice whose balance is already settled is closed as paid
/// instead. Returns the ids of the invoices that became overdue.
#[instrument(skip(db))]
pub async fn mark_overdue_invoices(db: &DatabaseConnection, as_of: NaiveDate) -> Result<Vec<i64>> {
    let txn = db.begin().await?;

    let past_due = Invoice::find()
        .filter(invoice::Column::Status.eq(InvoiceStatus::Sent))
        .filter(invoice::Column::DueDate.lt(as_of))
        .order_by_asc(invoice::Column::Id)
        .all(&txn)
        .await?;

    let mut changed = Vec::with_capacity(past_due.len());
    for invoice in past_due {
        let id = invoice.id;
        let summary = payment::payment_summary(&txn, id).await?;
        if summary.status == PaymentStatus::Paid {
            transition(&txn, invoice, InvoiceStatus::Paid).await?;
            continue;
        }
        transition(&txn, invoice, InvoiceStatus::Overdue).await?;
        changed.push(id);
    }

    txn.commit().await?;

    if !changed.is_empty() {
        info!(count = changed.len(), %as_of, "Invoices marked overdue");
    }
    Ok(changed)
}

/// Number of payment rows recorded against an invoice
pub async fn payment_count<C>(db: &C, invoice_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment_entity::Column::InvoiceId.eq(invoice_id))
        .count(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_invoice_assigns_number() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Acme Corp").await?;

        assert_eq!(invoice.invoice_number, format_invoice_number(invoice.id));
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.client_name, "Acme Corp");
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invoice_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let mut blank = test_new_invoice("   ");
        let result = create_invoice(&db, blank.clone()).await;
        assert!(matches!(result, Err(Error::EmptyField { .. })));

        blank.client_name = "Acme".to_string();
        blank.due_date = blank.issue_date.pred_opt().unwrap();
        let result = create_invoice(&db, blank.clone()).await;
        assert!(matches!(result, Err(Error::InvalidDueDate { .. })));

        blank.due_date = blank.issue_date;
        blank.tax_rate = dec!(-5);
        let result = create_invoice(&db, blank).await;
        assert!(matches!(
            result,
            Err(Error::InvalidAmount {
                field: "tax rate",
                ..
            })
        ));

        assert!(list_invoices(&db, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_worked_example_totals() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_worked_example_invoice(&db).await?;

        let details = get_invoice_details(&db, invoice.id).await?;
        assert_eq!(details.line_items.len(), 2);
        assert_eq!(details.totals.subtotal, dec!(6500));
        assert_eq!(details.totals.tax, dec!(650));
        assert_eq!(details.totals.total, dec!(7150));
        assert_eq!(details.payment_summary.remaining_balance, dec!(7150));
        Ok(())
    }

    #[tokio::test]
    async fn test_line_item_positions_and_update() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Acme").await?;

        let first = add_line_item(&db, invoice.id, test_line_item("Design", 1, dec!(100))).await?;
        let second = add_line_item(&db, invoice.id, test_line_item("Build", 2, dec!(50))).await?;
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        remove_line_item(&db, invoice.id, first.id).await?;
        let third = add_line_item(&db, invoice.id, test_line_item("QA", 1, dec!(10))).await?;
        assert_eq!(third.position, 2);

        let updated = update_line_item(
            &db,
            invoice.id,
            second.id,
            LineItemUpdate {
                quantity: Some(4),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.amount(), Some(dec!(200)));

        let totals = compute_totals(&db, &invoice).await?;
        assert_eq!(totals.subtotal, dec!(210));
        Ok(())
    }

    #[tokio::test]
    async fn test_line_item_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Acme").await?;

        let result = add_line_item(&db, invoice.id, test_line_item("Bad", 0, dec!(10))).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { quantity: 0 })));

        let result = add_line_item(&db, invoice.id, test_line_item("Bad", 1, dec!(-10))).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let item = add_line_item(&db, invoice.id, test_line_item("Ok", 1, dec!(10))).await?;
        let result = update_line_item(
            &db,
            invoice.id,
            item.id,
            LineItemUpdate {
                rate: Some(dec!(-1)),
                ..Default::default()
            },
        )
        .await;
        assert!(result.is_err());

        let result = update_line_item(&db, invoice.id, 9999, LineItemUpdate::default()).await;
        assert!(matches!(result, Err(Error::LineItemNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_discount_is_validated_against_subtotal() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Acme").await?;
        add_line_item(&db, invoice.id, test_line_item("Design", 1, dec!(100))).await?;

        let result = set_discount(&db, invoice.id, Discount::Fixed(dec!(150))).await;
        assert!(matches!(result, Err(Error::DiscountExceedsSubtotal { .. })));

        set_discount(&db, invoice.id, Discount::Percentage(dec!(10))).await?;
        set_tax_rate(&db, invoice.id, dec!(20)).await?;

        let details = get_invoice_details(&db, invoice.id).await?;
        assert_eq!(details.totals.discount_amount, dec!(10));
        assert_eq!(details.totals.tax, dec!(18));
        assert_eq!(details.totals.total, dec!(108));
        Ok(())
    }

    #[tokio::test]
    async fn test_sent_invoice_is_locked() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_worked_example_invoice(&db).await?;
        send_invoice(&db, invoice.id).await?;

        let result = add_line_item(&db, invoice.id, test_line_item("Extra", 1, dec!(1))).await;
        assert!(matches!(
            result,
            Err(Error::InvoiceLocked {
                status: InvoiceStatus::Sent,
                ..
            })
        ));
        let result = set_tax_rate(&db, invoice.id, dec!(5)).await;
        assert!(matches!(result, Err(Error::InvoiceLocked { .. })));

        let result = send_invoice(&db, invoice.id).await;
        assert!(matches!(result, Err(Error::InvalidStatusTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_invoice_cannot_be_sent() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Acme").await?;

        let result = send_invoice(&db, invoice.id).await;
        assert!(matches!(result, Err(Error::EmptyInvoice { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_overdue_invoices() -> Result<()> {
        let db = setup_test_db().await?;
        let sent = create_worked_example_invoice(&db).await?;
        send_invoice(&db, sent.id).await?;
        let draft = create_worked_example_invoice(&db).await?;

        let before_due = sent.due_date;
        assert!(mark_overdue_invoices(&db, before_due).await?.is_empty());

        let after_due = sent.due_date.succ_opt().unwrap();
        let changed = mark_overdue_invoices(&db, after_due).await?;
        assert_eq!(changed, vec![sent.id]);

        assert_eq!(get_invoice(&db, sent.id).await?.status, InvoiceStatus::Overdue);
        assert_eq!(get_invoice(&db, draft.id).await?.status, InvoiceStatus::Draft);

        // Already overdue invoices are not reported twice
        assert!(mark_overdue_invoices(&db, after_due).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_total_invoice_is_paid_on_send() -> Result<()> {
        let db = setup_test_db().await?;
        let invoice = create_test_invoice(&db, "Pro bono").await?;
        add_line_item(&db, invoice.id, test_line_item("Workshop", 1, dec!(400))).await?;
        set_discount(&db, invoice.id, Discount::Percentage(dec!(100))).await?;

        let sent = send_invoice(&db, invoice.id).await?;
        assert_eq!(sent.status, InvoiceStatus::Paid);

        let after_due = invoice.due_date.succ_opt().unwrap();
        assert!(mark_overdue_invoices(&db, after_due).await?.is_empty());
        assert_eq!(get_invoice(&db, invoice.id).await?.status, InvoiceStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_invoices_by_status() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_worked_example_invoice(&db).await?;
        create_worked_example_invoice(&db).await?;
        send_invoice(&db, a.id).await?;

        assert_eq!(list_invoices(&db, None).await?.len(), 2);
        let sent = list_invoices(&db, Some(InvoiceStatus::Sent)).await?;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, a.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_invoice() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(matches!(
            get_invoice(&db, 42).await,
            Err(Error::InvoiceNotFound { id: 42 })
        ));
        assert_eq!(payment_count(&db, 42).await?, 0);
        Ok(())
    }
}
