//! Payment entity - Append-only payment history of an invoice.
//!
//! Rows are inserted and never updated or deleted. Corrections are recorded
//! as `adjustment` rows with a negative amount.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a record is money received or a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Money received from the client (positive amount)
    #[sea_orm(string_value = "payment")]
    Payment,
    /// Offsetting correction of an earlier record (negative amount)
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

/// How the money was transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Wire or ACH transfer
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Card payment
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    /// Paper cheque
    #[sea_orm(string_value = "check")]
    Check,
    /// Cash in hand
    #[sea_orm(string_value = "cash")]
    Cash,
    /// PayPal transfer
    #[sea_orm(string_value = "paypal")]
    PayPal,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}

/// Payment record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice this record applies to
    pub invoice_id: i64,
    /// Payment or adjustment
    pub kind: PaymentKind,
    /// Signed amount (negative for adjustments)
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    /// Date the money moved
    pub payment_date: Date,
    /// Transfer method
    pub method: PaymentMethod,
    /// Bank reference, cheque number and the like
    pub reference: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the record was appended
    pub recorded_at: DateTimeUtc,
}

/// Defines relationships between payments and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
