//! Invoice entity - A bill sent to a client.
//!
//! Only the inputs of the totals are stored (discount and tax rate); subtotal,
//! tax and total are always derived from the line items on read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Still being edited
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Delivered to the client, awaiting payment
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Remaining balance has reached zero
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Past its due date and not fully paid
    #[sea_orm(string_value = "overdue")]
    Overdue,
}

impl InvoiceStatus {
    /// Lowercase name as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    ///
    /// `Paid` can fall back to `Sent` or `Overdue` when an adjustment
    /// reopens the balance.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Sent)
                | (Self::Sent | Self::Overdue, Self::Paid)
                | (Self::Sent, Self::Overdue)
                | (Self::Paid, Self::Sent | Self::Overdue)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Value is a percentage of the subtotal
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Value is an absolute amount
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

/// Invoice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing number, e.g. `INV-00042`
    pub invoice_number: String,
    /// Name of the billed client
    pub client_name: String,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Interpretation of `discount_value`
    pub discount_type: DiscountType,
    /// Discount as a percentage or a fixed amount
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_value: Decimal,
    /// Tax rate in percent, applied after the discount
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax_rate: Decimal,
    /// Date the invoice was issued
    pub issue_date: Date,
    /// Date payment is due
    pub due_date: Date,
    /// Free-form notes printed on the invoice
    pub notes: Option<String>,
    /// Recurring template this invoice was generated from, if any
    pub recurring_template_id: Option<i64>,
    /// When the invoice row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One invoice has many line items
    #[sea_orm(has_many = "super::line_item::Entity")]
    LineItems,
    /// One invoice has many payment records
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
