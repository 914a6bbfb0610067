//! Permission policy.
//!
//! Decides whether an action may be performed on a service. Pure: no I/O,
//! no logging, no process spawning.
//!
//! | level   | start | stop | restart |
//! |---------|-------|------|---------|
//! | all     | yes   | yes  | yes     |
//! | restart | no    | no   | yes     |
//! | stop    | no    | yes  | yes     |
//! | start   | yes   | no   | yes     |
//!
//! Restart is the minimum capability: every level grants it. Only `all`
//! grants both start and stop. Status is governed by the service's
//! `status_check_allowed` flag and never by its level.

use crate::services::{Action, PermissionLevel, ServiceSet};

/// Whether `level` grants a mutating `action`.
///
/// Always false for [`Action::Status`].
pub fn level_grants(level: PermissionLevel, action: Action) -> bool {
    matches!(
        (level, action),
        (PermissionLevel::All, Action::Start | Action::Stop | Action::Restart)
            | (PermissionLevel::Restart, Action::Restart)
            | (PermissionLevel::Stop, Action::Stop | Action::Restart)
            | (PermissionLevel::Start, Action::Start | Action::Restart)
    )
}

/// Check whether `action` is allowed on `service_name` under `services`.
///
/// Unknown services are never allowed anything.
pub fn is_allowed(services: &ServiceSet, service_name: &str, action: Action) -> bool {
    let Some(service) = services.get(service_name) else {
        return false;
    };

    match action {
        Action::Status => service.status_check_allowed,
        _ => level_grants(service.permission_level, action),
    }
}
