//! User entity - A team member or client known to the identity provider.
//!
//! Credentials live with the identity provider; only the external id, display
//! name and the last applied role are kept here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subject id issued by the identity provider
    #[sea_orm(unique)]
    pub external_id: String,
    /// Display name
    pub name: String,
    /// Name of the role template last applied
    pub role: String,
    /// When the user was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between users and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many granted permissions
    #[sea_orm(has_many = "super::user_permission::Entity")]
    Permissions,
    /// One user has many time entries
    #[sea_orm(has_many = "super::time_entry::Entity")]
    TimeEntries,
}

impl Related<super::user_permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Permissions.def()
    }
}

impl Related<super::time_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimeEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
