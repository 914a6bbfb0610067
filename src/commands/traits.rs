//! Command trait definition.

use crate::error::DaemonError;

use super::types::{CommandParams, CommandResult, ExecutionContext};

/// Core trait for all commands served on the control socket.
///
/// # Example
///
/// ```ignore
/// pub struct MyCommand;
///
/// impl Command for MyCommand {
///     fn name(&self) -> &'static str {
///         "my.command"
///     }
///
///     fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
///         params.get_string("service")?;
///         Ok(())
///     }
///
///     fn execute(
///         &self,
///         ctx: &ExecutionContext,
///         params: CommandParams,
///     ) -> Result<CommandResult, DaemonError> {
///         let service = params.get_string("service")?;
///         Ok(CommandResult::success(serde_json::json!({"service": service})))
///     }
/// }
/// ```
pub trait Command: Send + Sync {
    /// Unique command identifier (e.g., "service.restart").
    fn name(&self) -> &'static str;

    /// Validate the command parameters before execution.
    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError>;

    /// Execute the command.
    ///
    /// Called from a blocking context via `spawn_blocking`.
    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError>;

    /// Whether requests for this command are written to the audit log.
    ///
    /// Only commands that can change service state are audited.
    fn requires_audit(&self) -> bool {
        false
    }

    /// Service a request targets, for the audit log.
    fn target_service(&self, _params: &CommandParams) -> Option<String> {
        None
    }

    /// Action a request asks for, for the audit log.
    fn requested_action(&self, _params: &CommandParams) -> Option<String> {
        None
    }
}
