//! Recurring invoice template entity.
//!
//! A template points at a source invoice whose client, discount, tax rate and
//! line items are copied into every generated invoice.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How often a template produces an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every 7 days
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Every calendar month
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Every 3 calendar months
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    /// Every 12 calendar months
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

/// Recurring template database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recurring_invoice_templates")]
pub struct Model {
    /// Unique identifier for the template
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice whose content is copied on generation
    pub source_invoice_id: i64,
    /// Generation frequency
    pub frequency: Frequency,
    /// Issue date of the next invoice to generate
    pub next_invoice_date: Date,
    /// Day of month of the first occurrence, restored when the calendar allows
    pub anchor_day: i32,
    /// Paused templates are skipped
    pub is_active: bool,
    /// Number of invoices generated so far
    pub total_generated: i32,
    /// Period date of the most recent generation
    pub last_generated_for: Option<Date>,
    /// Days between issue date and due date of generated invoices
    pub payment_terms_days: i32,
    /// When the template was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between templates and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each template copies one source invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::SourceInvoiceId",
        to = "super::invoice::Column::Id"
    )]
    SourceInvoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceInvoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
