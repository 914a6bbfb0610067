//! Service management commands.
//!
//! - `services.list` - List registered services with their status
//! - `service.status` - Get the status of one service
//! - `service.start` / `service.stop` / `service.restart` - Run a helper
//! - `service.action` - Run the helper named by the `action` parameter
//!
//! `service.status` and `service.restart` target the configured default
//! service when no `service` parameter is given.

mod control;
mod list;
mod status;

pub use control::{ServiceActionCommand, ServiceControlCommand};
pub use list::ListServicesCommand;
pub use status::StatusServiceCommand;

use crate::executor::ActionOutcome;

use super::types::CommandResult;

/// Error code for an allowed action whose helper did not succeed.
pub const ACTION_FAILED: &str = "ACTION_FAILED";

/// Turn an executor outcome into a command result.
fn outcome_result(service: &str, outcome: ActionOutcome) -> CommandResult {
    let data = serde_json::json!({
        "service": service,
        "action": outcome.action,
        "success": outcome.success,
        "message": outcome.message,
    });

    if outcome.success {
        CommandResult::success(data)
    } else {
        CommandResult::failure(ACTION_FAILED, outcome.message).with_data(data)
    }
}
