//! Application settings loaded from environment variables.
//!
//! Values are usually provided through the `.env` file, which the binary loads
//! with `dotenvy` before calling [`AppSettings::from_env`]. Every variable is
//! optional and falls back to a sensible default.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::path::PathBuf;

/// Default number of days between issue date and due date
pub const DEFAULT_PAYMENT_TERMS_DAYS: i32 = 30;

/// Settings shared by the binary and the services it drives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// `SeaORM` connection string
    pub database_url: String,
    /// Location of the permission catalog
    pub permissions_path: PathBuf,
    /// Payment terms used when a recurring template does not set its own
    pub default_payment_terms_days: i32,
}

impl AppSettings {
    /// Reads `DATABASE_URL`, `PERMISSIONS_CONFIG` and `DEFAULT_PAYMENT_TERMS_DAYS`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `DEFAULT_PAYMENT_TERMS_DAYS` is set but is
    /// not a non-negative integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from `lookup`, which returns the value of a variable
    /// if it is set.
    ///
    /// # Errors
    /// Same as [`AppSettings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let permissions_path = lookup("PERMISSIONS_CONFIG")
            .map_or_else(|| PathBuf::from("permissions.toml"), PathBuf::from);

        let default_payment_terms_days = match lookup("DEFAULT_PAYMENT_TERMS_DAYS") {
            Some(raw) => parse_payment_terms(&raw)?,
            None => DEFAULT_PAYMENT_TERMS_DAYS,
        };

        Ok(Self {
            database_url,
            permissions_path,
            default_payment_terms_days,
        })
    }
}

fn parse_payment_terms(raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|days| *days >= 0)
        .ok_or_else(|| Error::Config {
            message: format!("DEFAULT_PAYMENT_TERMS_DAYS must be a non-negative integer, got {raw:?}"),
        })
}
