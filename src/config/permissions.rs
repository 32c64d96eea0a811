//! Permission catalog and role templates loaded from `permissions.toml`
//!
//! The catalog is read once at startup and validated before anything uses
//! it: permission ids are unique and prefixed by their module, role names are
//! unique, and role templates only reference catalog ids.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

/// Copy of the repository's `permissions.toml`, compiled into the binary.
const BUILTIN_CATALOG: &str = include_str!("../../permissions.toml");

/// Functional area a permission belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModule {
    /// Team membership
    Team,
    /// Client records
    Clients,
    /// Projects
    Projects,
    /// Task board
    Tasks,
    /// Invoices and payments
    Invoices,
    /// Dashboards and reports
    Analytics,
    /// Shared files
    Assets,
    /// Access control itself
    Permissions,
    /// Revenue and rates
    Financial,
    /// Workspace settings
    Settings,
}

impl PermissionModule {
    /// Prefix used by permission ids of this module
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Clients => "clients",
            Self::Projects => "projects",
            Self::Tasks => "tasks",
            Self::Invoices => "invoices",
            Self::Analytics => "analytics",
            Self::Assets => "assets",
            Self::Permissions => "permissions",
            Self::Financial => "financial",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for PermissionModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named permission
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionDef {
    /// Stable id, `<module>.<action>`
    pub id: String,
    /// Short display name
    pub name: String,
    /// Module the permission belongs to
    pub module: PermissionModule,
    /// One-line explanation shown next to the toggle
    #[serde(default)]
    pub description: String,
}

/// A named, flat set of permission ids
#[derive(Debug, Clone, Deserialize)]
pub struct RoleTemplate {
    /// Role name, e.g. `client`
    pub name: String,
    /// What the role is for
    #[serde(default)]
    pub description: String,
    /// Permission ids granted by the role
    pub permissions: BTreeSet<String>,
}

/// The whole permission configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionCatalog {
    /// Every permission that exists
    pub permissions: Vec<PermissionDef>,
    /// Role templates built from the catalog
    pub roles: Vec<RoleTemplate>,
}

impl PermissionCatalog {
    /// Parses and validates a catalog from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse permission catalog: {e}"),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Checks the invariants described in the module docs.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for permission in &self.permissions {
            if !ids.insert(permission.id.as_str()) {
                return Err(Error::Config {
                    message: format!("Duplicate permission id: {}", permission.id),
                });
            }
            let prefix = permission.id.split_once('.').map(|(module, _)| module);
            if prefix != Some(permission.module.as_str()) {
                return Err(Error::Config {
                    message: format!(
                        "Permission {} does not match its module {}",
                        permission.id, permission.module
                    ),
                });
            }
        }

        let mut role_names = HashSet::new();
        for role in &self.roles {
            if !role_names.insert(role.name.as_str()) {
                return Err(Error::Config {
                    message: format!("Duplicate role template: {}", role.name),
                });
            }
            if let Some(unknown) = role.permissions.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(Error::Config {
                    message: format!("Role {} references unknown permission {unknown}", role.name),
                });
            }
        }

        Ok(())
    }

    /// Whether `permission_id` exists in the catalog
    #[must_use]
    pub fn contains(&self, permission_id: &str) -> bool {
        self.permissions.iter().any(|p| p.id == permission_id)
    }

    /// Looks up a permission id, failing with [`Error::UnknownPermission`].
    pub fn permission(&self, permission_id: &str) -> Result<&PermissionDef> {
        self.permissions
            .iter()
            .find(|p| p.id == permission_id)
            .ok_or_else(|| Error::UnknownPermission {
                permission: permission_id.to_string(),
            })
    }

    /// Looks up a role template, failing with [`Error::UnknownRole`].
    pub fn template(&self, role: &str) -> Result<&RoleTemplate> {
        self.roles
            .iter()
            .find(|r| r.name == role)
            .ok_or_else(|| Error::UnknownRole {
                role: role.to_string(),
            })
    }

    /// Permissions of one module, in catalog order
    pub fn module_permissions(
        &self,
        module: PermissionModule,
    ) -> impl Iterator<Item = &PermissionDef> + '_ {
        self.permissions.iter().filter(move |p| p.module == module)
    }
}

/// Loads and validates the permission catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid or required fields are missing
/// - The catalog fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PermissionCatalog> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read {}: {e}", path.as_ref().display()),
    })?;
    PermissionCatalog::from_toml_str(&contents)
}
