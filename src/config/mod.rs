//! Configuration module for the service manager daemon.
//!
//! Handles loading and validating daemon configuration from TOML files.
//! The service registry itself is YAML and lives in [`crate::services`].

mod settings;

pub use settings::*;
