//! Input validation module.
//!
//! Service names are passed to privileged helpers as their only argument, so
//! they are checked before a registry entry is accepted and again before any
//! helper is spawned.

mod service_name;

pub use service_name::{validate_service_name, MAX_SERVICE_NAME_LEN};
