//! Service control commands.

use std::sync::Arc;

use tracing::debug;

use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::control::ControlFacade;
use crate::error::DaemonError;
use crate::executor::ProcessRunner;
use crate::services::Action;

use super::outcome_result;

/// `service.start`, `service.stop` or `service.restart`.
pub struct ServiceControlCommand<R> {
    facade: Arc<ControlFacade<R>>,
    action: Action,
    /// Target when the request names no service.
    default_service: Option<String>,
}

impl<R> ServiceControlCommand<R> {
    pub fn start(facade: Arc<ControlFacade<R>>) -> Self {
        Self {
            facade,
            action: Action::Start,
            default_service: None,
        }
    }

    pub fn stop(facade: Arc<ControlFacade<R>>) -> Self {
        Self {
            facade,
            action: Action::Stop,
            default_service: None,
        }
    }

    pub fn restart(facade: Arc<ControlFacade<R>>, default_service: impl Into<String>) -> Self {
        Self {
            facade,
            action: Action::Restart,
            default_service: Some(default_service.into()),
        }
    }

    fn service(&self, params: &CommandParams) -> Result<String, DaemonError> {
        match &self.default_service {
            Some(default) => Ok(params
                .get_optional_string("service")?
                .unwrap_or_else(|| default.clone())),
            None => params.get_string("service"),
        }
    }
}

impl<R: ProcessRunner> Command for ServiceControlCommand<R> {
    fn name(&self) -> &'static str {
        match self.action {
            Action::Start => "service.start",
            Action::Stop => "service.stop",
            Action::Restart => "service.restart",
            Action::Status => "service.status",
        }
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        self.service(params)?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = self.service(&params)?;

        debug!(
            request_id = %ctx.request_id,
            uid = ctx.peer.uid,
            service = %service,
            action = %self.action,
            "Service control requested"
        );

        let outcome = self.facade.perform_action(&service, self.action.as_str())?;
        Ok(outcome_result(&service, outcome))
    }

    fn requires_audit(&self) -> bool {
        true
    }

    fn target_service(&self, params: &CommandParams) -> Option<String> {
        self.service(params).ok()
    }

    fn requested_action(&self, _params: &CommandParams) -> Option<String> {
        Some(self.action.to_string())
    }
}

/// `service.action`: the action is a request parameter.
pub struct ServiceActionCommand<R> {
    facade: Arc<ControlFacade<R>>,
}

impl<R> ServiceActionCommand<R> {
    pub fn new(facade: Arc<ControlFacade<R>>) -> Self {
        Self { facade }
    }
}

impl<R: ProcessRunner> Command for ServiceActionCommand<R> {
    fn name(&self) -> &'static str {
        "service.action"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        params.get_string("service")?;
        params.get_string("action")?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = params.get_string("service")?;
        let action = params.get_string("action")?;

        debug!(
            request_id = %ctx.request_id,
            uid = ctx.peer.uid,
            service = %service,
            action = %action,
            "Service action requested"
        );

        let outcome = self.facade.perform_action(&service, &action)?;
        Ok(outcome_result(&service, outcome))
    }

    fn requires_audit(&self) -> bool {
        true
    }

    fn target_service(&self, params: &CommandParams) -> Option<String> {
        params.get_optional_string("service").ok().flatten()
    }

    fn requested_action(&self, params: &CommandParams) -> Option<String> {
        params.get_optional_string("action").ok().flatten()
    }
}
