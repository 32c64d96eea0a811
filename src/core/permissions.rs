//! User registration and permission grants.
//!
//! Permissions are a flat set of catalog ids per user. Role templates are
//! only a starting point: applying one replaces the user's grants with the
//! template set, after which single permissions can be granted or revoked.

use crate::{
    config::permissions::PermissionCatalog,
    entities::{User, UserPermission, user, user_permission},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Fetches a user or fails with [`Error::UserNotFound`].
pub async fn get_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })
}

/// Looks a user up by the identity provider's subject id.
pub async fn find_user_by_external_id<C>(db: &C, external_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Registers a user and grants the permissions of `role`.
#[instrument(skip(db, catalog))]
pub async fn register_user(
    db: &DatabaseConnection,
    catalog: &PermissionCatalog,
    external_id: &str,
    name: &str,
    role: &str,
) -> Result<user::Model> {
    if external_id.trim().is_empty() {
        return Err(Error::EmptyField {
            field: "external_id",
        });
    }
    if name.trim().is_empty() {
        return Err(Error::EmptyField { field: "name" });
    }
    let template = catalog.template(role)?;

    let txn = db.begin().await?;
    let user = user::ActiveModel {
        external_id: Set(external_id.trim().to_string()),
        name: Set(name.trim().to_string()),
        role: Set(template.name.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for permission_id in &template.permissions {
        insert_grant(&txn, user.id, permission_id).await?;
    }
    txn.commit().await?;

    info!(user_id = user.id, role = %user.role, "User registered");
    Ok(user)
}

async fn insert_grant<C>(db: &C, user_id: i64, permission_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    user_permission::ActiveModel {
        user_id: Set(user_id),
        permission_id: Set(permission_id.to_string()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Replaces all of a user's grants with the permissions of `role`.
///
/// # Arguments
/// * `db` - Database connection; the old grants are removed and the new ones
///   inserted in one transaction
/// * `catalog` - Catalog holding the role templates
/// * `user_id` - User whose grants are replaced
/// * `role` - Template name; it also becomes the user's role
///
/// # Returns
/// The permission ids the user holds afterwards.
#[instrument(skip(db, catalog))]
pub async fn apply_role_template(
    db: &DatabaseConnection,
    catalog: &PermissionCatalog,
    user_id: i64,
    role: &str,
) -> Result<BTreeSet<String>> {
    let template = catalog.template(role)?;

    let txn = db.begin().await?;
    let user = get_user(&txn, user_id).await?;

    UserPermission::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    for permission_id in &template.permissions {
        insert_grant(&txn, user_id, permission_id).await?;
    }

    let mut active: user::ActiveModel = user.into();
    active.role = Set(template.name.clone());
    active.update(&txn).await?;
    txn.commit().await?;

    info!(
        user_id,
        role = %template.name,
        permissions = template.permissions.len(),
        "Role template applied"
    );
    Ok(template.permissions.clone())
}

/// Grants one catalog permission. Returns `false` if it was already granted.
#[instrument(skip(db, catalog))]
pub async fn grant_permission(
    db: &DatabaseConnection,
    catalog: &PermissionCatalog,
    user_id: i64,
    permission_id: &str,
) -> Result<bool> {
    catalog.permission(permission_id)?;
    get_user(db, user_id).await?;

    let existing = UserPermission::find_by_id((user_id, permission_id.to_string()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(false);
    }

    insert_grant(db, user_id, permission_id).await?;
    info!(user_id, permission = permission_id, "Permission granted");
    Ok(true)
}

/// Revokes one catalog permission. Returns `false` if it was not granted.
#[instrument(skip(db, catalog))]
pub async fn revoke_permission(
    db: &DatabaseConnection,
    catalog: &PermissionCatalog,
    user_id: i64,
    permission_id: &str,
) -> Result<bool> {
    catalog.permission(permission_id)?;
    get_user(db, user_id).await?;

    let result = UserPermission::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::PermissionId.eq(permission_id))
        .exec(db)
        .await?;

    let revoked = result.rows_affected > 0;
    if revoked {
        info!(user_id, permission = permission_id, "Permission revoked");
    }
    Ok(revoked)
}

/// The user's effective permission set.
pub async fn resolve_permissions<C>(db: &C, user_id: i64) -> Result<BTreeSet<String>>
where
    C: ConnectionTrait,
{
    get_user(db, user_id).await?;
    let grants = UserPermission::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .order_by_asc(user_permission::Column::PermissionId)
        .all(db)
        .await?;
    Ok(grants.into_iter().map(|g| g.permission_id).collect())
}

/// Whether the user holds `permission_id`.
pub async fn has_permission<C>(db: &C, user_id: i64, permission_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let grant = UserPermission::find_by_id((user_id, permission_id.to_string()))
        .one(db)
        .await?;
    Ok(grant.is_some())
}
