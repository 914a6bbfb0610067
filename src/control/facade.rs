//! The control facade: policy first, then the executor.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::ControlError;
use crate::executor::{
    ActionOutcome, HelperCommands, ProcessRunner, ServiceExecutor, StatusValue, SystemRunner,
};
use crate::policy;
use crate::services::{Action, PermissionLevel, ServiceRegistry};

/// One row of [`ControlFacade::list_services`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub status: StatusValue,
    pub permissions: PermissionLevel,
}

/// Single entry point for listing, querying and acting on services.
///
/// Every call reloads the registry. No privileged helper is spawned unless
/// the permission policy allows the request.
pub struct ControlFacade<R = SystemRunner> {
    registry: ServiceRegistry,
    executor: ServiceExecutor<R>,
}

impl ControlFacade<SystemRunner> {
    /// Build a facade over the real helpers described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ServiceRegistry::new(&settings.registry.path),
            ServiceExecutor::new(HelperCommands::from_config(&settings.helpers)),
        )
    }
}

impl<R: ProcessRunner> ControlFacade<R> {
    pub fn new(registry: ServiceRegistry, executor: ServiceExecutor<R>) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &ServiceExecutor<R> {
        &self.executor
    }

    /// Every registered service with its current status, in name order.
    ///
    /// A status lookup that panics yields [`StatusValue::Error`] for that
    /// entry only.
    pub fn list_services(&self) -> Vec<ServiceSummary> {
        let services = self.registry.load();

        services
            .iter()
            .map(|service| {
                let status = catch_unwind(AssertUnwindSafe(|| self.executor.get_status(service)))
                    .unwrap_or_else(|_| {
                        error!(service = %service.name, "Status lookup panicked");
                        StatusValue::Error
                    });

                ServiceSummary {
                    name: service.name.clone(),
                    display_name: service.display_name.clone(),
                    description: service.description.clone(),
                    status,
                    permissions: service.permission_level,
                }
            })
            .collect()
    }

    /// Status of one registered service.
    pub fn get_status(&self, service_name: &str) -> Result<StatusValue, ControlError> {
        let services = self.registry.load();
        let service = services
            .get(service_name)
            .ok_or_else(|| ControlError::NotFound {
                service: service_name.to_string(),
            })?;

        Ok(self.executor.get_status(service))
    }

    /// Start, stop or restart a service.
    ///
    /// The action is parsed before the registry is consulted; a refused
    /// request never reaches the executor. Unregistered services are refused
    /// as [`ControlError::PermissionDenied`].
    pub fn perform_action(
        &self,
        service_name: &str,
        action: &str,
    ) -> Result<ActionOutcome, ControlError> {
        let action = match Action::from_str(action) {
            Ok(action) if action.is_mutating() => action,
            _ => {
                debug!(action = %action, "Rejected invalid action");
                return Err(ControlError::InvalidAction {
                    action: action.to_string(),
                });
            }
        };

        let services = self.registry.load();
        if !policy::is_allowed(&services, service_name, action) {
            warn!(
                service = %service_name,
                action = %action,
                registered = services.contains(service_name),
                "Action not permitted"
            );
            return Err(ControlError::PermissionDenied {
                service: service_name.to_string(),
                action: action.to_string(),
            });
        }

        info!(service = %service_name, action = %action, "Performing service action");
        Ok(self.executor.perform_action(service_name, action))
    }
}
