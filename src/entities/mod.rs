//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod invoice;
pub mod line_item;
pub mod payment;
pub mod recurring_template;
pub mod time_entry;
pub mod user;
pub mod user_permission;

// Re-export specific types to avoid conflicts
pub use invoice::{Column as InvoiceColumn, Entity as Invoice, Model as InvoiceModel};
pub use line_item::{Column as LineItemColumn, Entity as LineItem, Model as LineItemModel};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use recurring_template::{
    Column as RecurringTemplateColumn, Entity as RecurringTemplate,
    Model as RecurringTemplateModel,
};
pub use time_entry::{Column as TimeEntryColumn, Entity as TimeEntry, Model as TimeEntryModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_permission::{
    Column as UserPermissionColumn, Entity as UserPermission, Model as UserPermissionModel,
};
