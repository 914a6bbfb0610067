//! Service status command.

use std::sync::Arc;

use tracing::debug;

use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::control::ControlFacade;
use crate::error::DaemonError;
use crate::executor::ProcessRunner;

/// Get the status of a service.
pub struct StatusServiceCommand<R> {
    facade: Arc<ControlFacade<R>>,
    default_service: String,
}

impl<R> StatusServiceCommand<R> {
    pub fn new(facade: Arc<ControlFacade<R>>, default_service: impl Into<String>) -> Self {
        Self {
            facade,
            default_service: default_service.into(),
        }
    }
}

impl<R: ProcessRunner> Command for StatusServiceCommand<R> {
    fn name(&self) -> &'static str {
        "service.status"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        params.get_optional_string("service")?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = params
            .get_optional_string("service")?
            .unwrap_or_else(|| self.default_service.clone());

        let status = self.facade.get_status(&service)?;

        debug!(
            request_id = %ctx.request_id,
            service = %service,
            status = %status,
            "Service status retrieved"
        );

        Ok(CommandResult::success(serde_json::json!({
            "service": service,
            "status": status,
        })))
    }
}
