//! Line item entity - One billable row of an invoice.
//!
//! The row amount is never stored; [`Model::amount`] recomputes it from
//! quantity and rate every time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Line item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_line_items")]
pub struct Model {
    /// Unique identifier for the line item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning invoice
    pub invoice_id: i64,
    /// Display order within the invoice, starting at 0
    pub position: i32,
    /// What is being billed
    pub description: String,
    /// Number of units, at least 1
    pub quantity: i32,
    /// Price per unit
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub rate: Decimal,
    /// Whether the item is subject to tax
    pub taxable: bool,
    /// Grouping label (e.g. "design", "development")
    pub category: String,
}

impl Model {
    /// `quantity x rate`, `None` if the product overflows
    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.rate)
    }
}

/// Defines relationships between line items and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line item belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
