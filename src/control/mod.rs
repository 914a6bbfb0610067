//! Control surface for the service manager.
//!
//! [`ControlFacade`] composes the registry, the permission policy and the
//! executor into the three operations exposed to clients.

mod facade;

pub use facade::{ControlFacade, ServiceSummary};
