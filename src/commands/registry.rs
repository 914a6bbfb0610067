//! Command registry for dispatching requests to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Settings;
use crate::control::ControlFacade;
use crate::error::{CommandErrorKind, DaemonError};
use crate::executor::ProcessRunner;

use super::service::{
    ListServicesCommand, ServiceActionCommand, ServiceControlCommand, StatusServiceCommand,
};
use super::traits::Command;
use super::types::{CommandParams, CommandResult, ExecutionContext};

/// Registry of all available commands.
#[derive(Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry serving `facade`.
    ///
    /// `default_service` is the target of `service.status` and
    /// `service.restart` requests that name no service.
    pub fn new<R: ProcessRunner + 'static>(
        facade: Arc<ControlFacade<R>>,
        default_service: &str,
    ) -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        registry.register(Arc::new(ListServicesCommand::new(Arc::clone(&facade))));
        registry.register(Arc::new(StatusServiceCommand::new(
            Arc::clone(&facade),
            default_service,
        )));
        registry.register(Arc::new(ServiceControlCommand::start(Arc::clone(&facade))));
        registry.register(Arc::new(ServiceControlCommand::stop(Arc::clone(&facade))));
        registry.register(Arc::new(ServiceControlCommand::restart(
            Arc::clone(&facade),
            default_service,
        )));
        registry.register(Arc::new(ServiceActionCommand::new(facade)));

        info!(
            count = registry.commands.len(),
            default_service = default_service,
            "Command registry initialized"
        );

        registry
    }

    /// Create a registry over the real helpers and registry file in `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(ControlFacade::from_settings(settings)),
            &settings.registry.default_service,
        )
    }

    /// Register a command.
    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        debug!(command = name, "Registering command");
        self.commands.insert(name, command);
    }

    /// Get a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Dispatch a request to the appropriate command handler.
    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        command_name: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let command = self
            .commands
            .get(command_name)
            .ok_or_else(|| DaemonError::Command {
                kind: CommandErrorKind::UnknownCommand {
                    name: command_name.to_string(),
                },
            })?;

        command.validate(&params)?;
        command.execute(ctx, params)
    }

    /// List all registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PeerInfo;
    use crate::error::ControlError;
    use crate::executor::testing::RecordingRunner;
    use crate::executor::{HelperCommands, Invocation, ServiceExecutor};
    use crate::services::ServiceRegistry;
    use tempfile::TempDir;
    use uuid::Uuid;

    const REGISTRY: &str = r#"
services:
  pzserver: {}
  web:
    permissions_required: stop
  quiet:
    status_check_allowed: false
"#;

    struct Fixture {
        _dir: TempDir,
        facade: Arc<ControlFacade<RecordingRunner>>,
        registry: CommandRegistry,
    }

    fn fixture_with(runner: RecordingRunner) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.yaml");
        std::fs::write(&path, REGISTRY).unwrap();
        let facade = Arc::new(ControlFacade::new(
            ServiceRegistry::new(path),
            ServiceExecutor::with_runner(HelperCommands::default(), runner),
        ));
        let registry = CommandRegistry::new(Arc::clone(&facade), "pzserver");
        Fixture {
            _dir: dir,
            facade,
            registry,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingRunner::succeeding())
    }

    fn create_test_context() -> ExecutionContext {
        ExecutionContext::new(
            Uuid::new_v4(),
            PeerInfo {
                uid: 1000,
                gid: 1000,
                pid: 12345,
            },
        )
    }

    fn dispatch(
        fixture: &Fixture,
        command: &str,
        params: serde_json::Value,
    ) -> Result<CommandResult, DaemonError> {
        fixture.registry.dispatch(
            &create_test_context(),
            command,
            CommandParams::new(params),
        )
    }

    fn spawned_services(fixture: &Fixture) -> Vec<String> {
        fixture
            .facade
            .executor()
            .runner()
            .calls()
            .iter()
            .map(|c| c.get_args().join(" "))
            .collect()
    }

    #[test]
    fn test_registry_has_commands() {
        let fixture = fixture();
        assert_eq!(
            fixture.registry.list_commands(),
            vec![
                "service.action",
                "service.restart",
                "service.start",
                "service.status",
                "service.stop",
                "services.list",
            ]
        );
        assert!(fixture.registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_only_mutating_commands_are_audited() {
        let fixture = fixture();
        for name in fixture.registry.list_commands() {
            let audited = fixture.registry.get(name).unwrap().requires_audit();
            let expected = name != "services.list" && name != "service.status";
            assert_eq!(audited, expected, "command={}", name);
        }
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let fixture = fixture();
        let result = dispatch(&fixture, "service.reboot", serde_json::json!({}));
        assert!(matches!(
            result,
            Err(DaemonError::Command {
                kind: CommandErrorKind::UnknownCommand { .. }
            })
        ));
    }

    #[test]
    fn test_list_services() {
        let fixture = fixture();
        let result = dispatch(&fixture, "services.list", serde_json::json!({})).unwrap();
        assert!(result.success);

        let data = result.data.unwrap();
        let services = data["services"].as_array().unwrap();
        assert_eq!(services.len(), 3);
        assert_eq!(services[0]["name"], "pzserver");
        assert_eq!(services[0]["status"], "active");
        assert_eq!(services[1]["name"], "quiet");
        assert_eq!(services[1]["status"], "status_check_disabled");
        assert_eq!(services[2]["permissions"], "stop");
    }

    #[test]
    fn test_status_defaults_to_default_service() {
        let fixture = fixture();
        let result = dispatch(&fixture, "service.status", serde_json::json!({})).unwrap();
        let data = result.data.unwrap();
        assert_eq!(data["service"], "pzserver");
        assert_eq!(data["status"], "active");
        assert_eq!(
            spawned_services(&fixture),
            vec!["-n /usr/local/bin/service-manager-status pzserver"]
        );
    }

    #[test]
    fn test_status_not_found() {
        let fixture = fixture();
        let err = dispatch(&fixture, "service.status", serde_json::json!({"service": "db"}))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_restart_defaults_to_default_service() {
        let fixture = fixture();
        let result = dispatch(&fixture, "service.restart", serde_json::json!({})).unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["service"], "pzserver");
        assert_eq!(data["message"], "Service restart initiated successfully");
    }

    #[test]
    fn test_start_requires_service() {
        let fixture = fixture();
        let err = dispatch(&fixture, "service.start", serde_json::json!({})).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");

        let err = dispatch(&fixture, "service.start", serde_json::json!({"service": 7}))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
        assert!(spawned_services(&fixture).is_empty());
    }

    #[test]
    fn test_policy_applies_to_commands() {
        let fixture = fixture();
        let err = dispatch(&fixture, "service.start", serde_json::json!({"service": "web"}))
            .unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Control(ControlError::PermissionDenied { .. })
        ));
        assert_eq!(err.code(), "PERMISSION_DENIED");

        let result =
            dispatch(&fixture, "service.stop", serde_json::json!({"service": "web"})).unwrap();
        assert!(result.success);
        assert_eq!(
            spawned_services(&fixture),
            vec!["-n /usr/local/bin/service-manager-stop web"]
        );
    }

    #[test]
    fn test_service_action() {
        let fixture = fixture();
        let err = dispatch(
            &fixture,
            "service.action",
            serde_json::json!({"service": "web", "action": "reboot"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_ACTION");

        let err = dispatch(&fixture, "service.action", serde_json::json!({"service": "web"}))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");

        let result = dispatch(
            &fixture,
            "service.action",
            serde_json::json!({"service": "web", "action": "restart"}),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(spawned_services(&fixture).len(), 1);
    }

    #[test]
    fn test_failed_action_reports_action_failed() {
        let fixture = fixture_with(RecordingRunner::returning(Invocation::TimedOut {
            after: std::time::Duration::from_secs(30),
        }));
        let result =
            dispatch(&fixture, "service.stop", serde_json::json!({"service": "web"})).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("ACTION_FAILED"));
        assert_eq!(
            result.error_message.as_deref(),
            Some("Timeout while stopping service")
        );
        assert_eq!(result.data.unwrap()["action"], "stop");
    }
}
