//! Time entry entity - One start/stop interval of tracked work.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Time entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who tracked the time
    pub user_id: i64,
    /// Task or project label the time is booked against
    pub task: String,
    /// Optional note about the work done
    pub description: Option<String>,
    /// When the timer was started
    pub started_at: DateTimeUtc,
    /// When the timer was stopped, `None` while running
    pub ended_at: Option<DateTimeUtc>,
    /// Whether the time can be billed to a client
    pub billable: bool,
}

impl Model {
    /// Whether the timer is still running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Defines relationships between time entries and users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one user
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
