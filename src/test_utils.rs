//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating invoices, users and templates with sensible defaults.

use crate::{
    config::{
        permissions::PermissionCatalog,
        settings::{AppSettings, DEFAULT_PAYMENT_TERMS_DAYS},
    },
    core::{
        events::{DomainEvent, EventSink},
        invoice::{self, NewInvoice, NewLineItem},
        payment::NewPayment,
        permissions,
        recurring::{self, NewRecurringTemplate},
        totals::Discount,
    },
    entities::{self, payment::PaymentMethod, recurring_template::Frequency},
    errors::Result,
};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Settings with every default in place.
pub fn test_settings() -> AppSettings {
    AppSettings {
        database_url: "sqlite::memory:".to_string(),
        permissions_path: PathBuf::from("permissions.toml"),
        default_payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
    }
}

/// Invoice input for `client_name`.
///
/// # Defaults
/// * `issue_date`: today
/// * `due_date`: today + 30 days
/// * no discount, no tax, no notes
pub fn test_new_invoice(client_name: &str) -> NewInvoice {
    let today = Utc::now().date_naive();
    NewInvoice {
        client_name: client_name.to_string(),
        issue_date: today,
        due_date: today.checked_add_days(Days::new(30)).unwrap_or(today),
        discount: Discount::none(),
        tax_rate: Decimal::ZERO,
        notes: None,
    }
}

/// Line item input with a taxable `services` category.
pub fn test_line_item(description: &str, quantity: i32, rate: Decimal) -> NewLineItem {
    NewLineItem {
        description: description.to_string(),
        quantity,
        rate,
        taxable: true,
        category: "services".to_string(),
    }
}

/// Payment input by bank transfer dated today.
pub fn test_payment(amount: Decimal) -> NewPayment {
    NewPayment {
        amount,
        payment_date: Utc::now().date_naive(),
        method: PaymentMethod::BankTransfer,
        reference: None,
        notes: None,
    }
}

/// Creates an empty draft invoice for `client_name`.
pub async fn create_test_invoice(
    db: &DatabaseConnection,
    client_name: &str,
) -> Result<entities::invoice::Model> {
    invoice::create_invoice(db, test_new_invoice(client_name)).await
}

/// Creates the draft invoice with items `[(1, 5000), (3, 500)]` and 10% tax.
///
/// Subtotal 6500, tax 650, total 7150.
pub async fn create_worked_example_invoice(
    db: &DatabaseConnection,
) -> Result<entities::invoice::Model> {
    let mut new = test_new_invoice("Acme Corp");
    new.tax_rate = Decimal::TEN;
    let created = invoice::create_invoice(db, new).await?;

    invoice::add_line_item(
        db,
        created.id,
        test_line_item("Website redesign", 1, Decimal::from(5000)),
    )
    .await?;
    invoice::add_line_item(
        db,
        created.id,
        test_line_item("Content pages", 3, Decimal::from(500)),
    )
    .await?;
    Ok(created)
}

/// Sets up a database with the worked example invoice already sent.
/// Returns (db, invoice) for payment tests.
pub async fn setup_with_sent_invoice() -> Result<(DatabaseConnection, entities::invoice::Model)> {
    let db = setup_test_db().await?;
    let draft = create_worked_example_invoice(&db).await?;
    let sent = invoice::send_invoice(&db, draft.id).await?;
    Ok((db, sent))
}

/// Creates a recurring template with the default payment terms.
pub async fn create_test_template(
    db: &DatabaseConnection,
    source_invoice_id: i64,
    frequency: Frequency,
    first_invoice_date: NaiveDate,
) -> Result<entities::recurring_template::Model> {
    recurring::create_template(
        db,
        &test_settings(),
        NewRecurringTemplate {
            source_invoice_id,
            frequency,
            first_invoice_date,
            payment_terms_days: None,
        },
    )
    .await
}

static NEXT_TEST_USER: AtomicU64 = AtomicU64::new(1);

/// Registers a user with a unique external id and the given role.
pub async fn create_test_user(
    db: &DatabaseConnection,
    catalog: &PermissionCatalog,
    role: &str,
) -> Result<entities::user::Model> {
    let n = NEXT_TEST_USER.fetch_add(1, Ordering::Relaxed);
    permissions::register_user(db, catalog, &format!("test|{n}"), "Test User", role).await
}

/// Event sink that keeps every published event for assertions.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    /// Snapshot of the events published so far, in order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &DomainEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
