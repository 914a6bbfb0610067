//! Service registry module.
//!
//! Contains the service definition types and the YAML-backed registry that
//! declares which services may be managed and with which permission level.
//!
//! ## Registry format
//!
//! ```yaml
//! services:
//!   web:
//!     display_name: "Web Frontend"
//!     description: "Public nginx"
//!     permissions_required: stop   # start | stop | restart | all
//!     status_check_allowed: true
//! ```

mod definition;
mod registry;

pub use definition::{Action, PermissionLevel, ServiceDefinition, UnknownAction};
pub use registry::{ServiceRegistry, ServiceSet};
