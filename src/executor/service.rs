//! Service executor.
//!
//! Invokes the privileged helpers and maps their results onto
//! [`StatusValue`] and [`ActionOutcome`]. One helper per action; each takes
//! the service name as its only argument.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::HelpersConfig;
use crate::services::{Action, ServiceDefinition};
use crate::validation::validate_service_name;

use super::output::sanitize_output;
use super::subprocess::{Invocation, ProcessRunner, Subprocess, SystemRunner};

/// Environment handed to helpers; everything else is cleared.
const HELPER_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";

/// Lines of helper stderr kept in failure messages.
const STDERR_MAX_LINES: usize = 20;

/// Normalized result of a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
    /// State string printed by the status helper (e.g. "active").
    State(String),
    /// The status helper exited non-zero.
    Inactive,
    /// The status helper exceeded its timeout.
    Timeout,
    /// The status helper could not be run.
    Error,
    /// Status checks are disabled for this service.
    StatusCheckDisabled,
}

impl StatusValue {
    pub fn as_str(&self) -> &str {
        match self {
            StatusValue::State(state) => state,
            StatusValue::Inactive => "inactive",
            StatusValue::Timeout => "timeout",
            StatusValue::Error => "error",
            StatusValue::StatusCheckDisabled => "status_check_disabled",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of a start/stop/restart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    fn succeeded(action: Action, message: String) -> Self {
        Self {
            action,
            success: true,
            message,
        }
    }

    fn failed(action: Action, message: String) -> Self {
        Self {
            action,
            success: false,
            message,
        }
    }
}

/// Resolved helper programs and timeouts.
#[derive(Debug, Clone)]
pub struct HelperCommands {
    escalation: Option<(PathBuf, Vec<String>)>,
    status: PathBuf,
    start: PathBuf,
    stop: PathBuf,
    restart: PathBuf,
    status_timeout: Duration,
    action_timeout: Duration,
}

impl HelperCommands {
    pub fn from_config(config: &HelpersConfig) -> Self {
        let escalation = config.use_escalation.then(|| {
            (
                config.escalation_wrapper.clone(),
                config.escalation_args.clone(),
            )
        });
        Self {
            escalation,
            status: config.status.clone(),
            start: config.start.clone(),
            stop: config.stop.clone(),
            restart: config.restart.clone(),
            status_timeout: config.status_timeout(),
            action_timeout: config.action_timeout(),
        }
    }

    /// Override both timeouts.
    pub fn with_timeouts(mut self, status: Duration, action: Duration) -> Self {
        self.status_timeout = status;
        self.action_timeout = action;
        self
    }

    fn helper(&self, action: Action) -> &PathBuf {
        match action {
            Action::Status => &self.status,
            Action::Start => &self.start,
            Action::Stop => &self.stop,
            Action::Restart => &self.restart,
        }
    }

    fn timeout(&self, action: Action) -> Duration {
        match action {
            Action::Status => self.status_timeout,
            _ => self.action_timeout,
        }
    }

    /// The exact command line for `action` on `service`.
    pub fn command(&self, action: Action, service: &str) -> Subprocess {
        let helper = self.helper(action);
        let command = match &self.escalation {
            Some((wrapper, args)) => Subprocess::new(wrapper)
                .args(args)
                .arg(helper.to_string_lossy())
                .arg(service),
            None => Subprocess::new(helper).arg(service),
        };
        command
            .timeout(self.timeout(action))
            .clear_env()
            .env("PATH", HELPER_PATH)
            .env("LC_ALL", "C")
    }
}

impl Default for HelperCommands {
    fn default() -> Self {
        Self::from_config(&HelpersConfig::default())
    }
}

/// Runs privileged helpers for status queries and service actions.
pub struct ServiceExecutor<R = SystemRunner> {
    helpers: HelperCommands,
    runner: R,
}

impl ServiceExecutor<SystemRunner> {
    pub fn new(helpers: HelperCommands) -> Self {
        Self::with_runner(helpers, SystemRunner)
    }
}

impl<R: ProcessRunner> ServiceExecutor<R> {
    pub fn with_runner(helpers: HelperCommands, runner: R) -> Self {
        Self { helpers, runner }
    }

    pub fn helpers(&self) -> &HelperCommands {
        &self.helpers
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Query the status of a service.
    ///
    /// Returns [`StatusValue::StatusCheckDisabled`] without spawning anything
    /// when the definition disallows status checks.
    pub fn get_status(&self, service: &ServiceDefinition) -> StatusValue {
        if !service.status_check_allowed {
            debug!(service = %service.name, "Status checking disabled");
            return StatusValue::StatusCheckDisabled;
        }

        if let Err(e) = validate_service_name(&service.name) {
            warn!(service = %service.name, error = %e, "Refusing status check for invalid service name");
            return StatusValue::Error;
        }

        let command = self.helpers.command(Action::Status, &service.name);
        let status = match self.runner.run(&command) {
            Invocation::Completed {
                exit_code: Some(0),
                stdout,
                ..
            } => StatusValue::State(stdout.trim().to_string()),
            Invocation::Completed {
                exit_code, stderr, ..
            } => {
                debug!(
                    service = %service.name,
                    exit_code = ?exit_code,
                    stderr = %stderr.trim(),
                    "Status helper exited non-zero"
                );
                StatusValue::Inactive
            }
            Invocation::TimedOut { after } => {
                warn!(
                    service = %service.name,
                    timeout_ms = after.as_millis() as u64,
                    "Status helper timed out"
                );
                StatusValue::Timeout
            }
            Invocation::SpawnFailed { reason } => {
                warn!(service = %service.name, error = %reason, "Status helper failed");
                StatusValue::Error
            }
        };

        debug!(service = %service.name, status = %status, "Service status retrieved");
        status
    }

    /// Run the start, stop or restart helper for a service.
    ///
    /// `Action::Status` is rejected before anything is spawned.
    pub fn perform_action(&self, service: &str, action: Action) -> ActionOutcome {
        if !action.is_mutating() {
            return ActionOutcome::failed(action, format!("Invalid action: {}", action));
        }

        if let Err(e) = validate_service_name(service) {
            warn!(service = %service, error = %e, "Refusing action for invalid service name");
            return ActionOutcome::failed(action, format!("Invalid service name: {}", e));
        }

        debug!(service = %service, action = %action, "Running service helper");

        let command = self.helpers.command(action, service);
        match self.runner.run(&command) {
            Invocation::Completed {
                exit_code: Some(0),
                ..
            } => {
                info!(service = %service, action = %action, "Service action succeeded");
                ActionOutcome::succeeded(action, format!("Service {} initiated successfully", action))
            }
            Invocation::Completed {
                exit_code, stderr, ..
            } => {
                let stderr = sanitize_output(&stderr, STDERR_MAX_LINES);
                warn!(
                    service = %service,
                    action = %action,
                    exit_code = ?exit_code,
                    stderr = %stderr,
                    "Service action failed"
                );
                ActionOutcome::failed(action, format!("Failed to {} service: {}", action, stderr))
            }
            Invocation::TimedOut { after } => {
                warn!(
                    service = %service,
                    action = %action,
                    timeout_ms = after.as_millis() as u64,
                    "Service action timed out"
                );
                ActionOutcome::failed(
                    action,
                    format!("Timeout while {} service", action.progressive()),
                )
            }
            Invocation::SpawnFailed { reason } => {
                warn!(service = %service, action = %action, error = %reason, "Service helper failed");
                ActionOutcome::failed(
                    action,
                    format!("Error {} service: {}", action.progressive(), reason),
                )
            }
        }
    }
}
