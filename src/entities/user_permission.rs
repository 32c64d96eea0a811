//! User permission entity - One granted permission id per row.
//!
//! The composite primary key keeps a permission from being granted twice.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Granted permission database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_permissions")]
pub struct Model {
    /// Owning user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Catalog permission id, e.g. `invoices.create`
    #[sea_orm(primary_key, auto_increment = false)]
    pub permission_id: String,
}

/// Defines relationships between granted permissions and users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each grant belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
