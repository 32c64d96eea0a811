/// Database configuration and connection management
pub mod database;

/// Permission catalog and role templates from permissions.toml
pub mod permissions;

/// Application settings from environment variables
pub mod settings;
