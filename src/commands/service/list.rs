//! List registered services.

use std::sync::Arc;

use tracing::debug;

use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::control::ControlFacade;
use crate::error::DaemonError;
use crate::executor::ProcessRunner;

/// List every registered service with its status and permission level.
pub struct ListServicesCommand<R> {
    facade: Arc<ControlFacade<R>>,
}

impl<R> ListServicesCommand<R> {
    pub fn new(facade: Arc<ControlFacade<R>>) -> Self {
        Self { facade }
    }
}

impl<R: ProcessRunner> Command for ListServicesCommand<R> {
    fn name(&self) -> &'static str {
        "services.list"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), DaemonError> {
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let services = self.facade.list_services();

        debug!(
            request_id = %ctx.request_id,
            count = services.len(),
            "Listed services"
        );

        Ok(CommandResult::success(serde_json::json!({
            "services": services,
        })))
    }
}
