//! Configuration settings for the service manager daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DaemonError, DaemonResult};

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub socket: SocketConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub helpers: HelpersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// UIDs allowed to connect. Empty means nobody may connect.
    #[serde(default)]
    pub allowed_peer_uids: Vec<u32>,
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path to the YAML service registry, re-read on every access.
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
    /// Service targeted by legacy requests that carry no service name.
    #[serde(default = "default_service")]
    pub default_service: String,
}

/// Privileged helper configuration.
///
/// Each action has its own helper program. Helpers receive the service name
/// as their only argument.
#[derive(Debug, Clone, Deserialize)]
pub struct HelpersConfig {
    /// Run helpers through the escalation wrapper.
    #[serde(default = "default_use_escalation")]
    pub use_escalation: bool,
    /// Privilege escalation wrapper (e.g., sudo).
    #[serde(default = "default_escalation_wrapper")]
    pub escalation_wrapper: PathBuf,
    /// Arguments passed to the wrapper before the helper path.
    #[serde(default = "default_escalation_args")]
    pub escalation_args: Vec<String>,
    #[serde(default = "default_status_helper")]
    pub status: PathBuf,
    #[serde(default = "default_start_helper")]
    pub start: PathBuf,
    #[serde(default = "default_stop_helper")]
    pub stop: PathBuf,
    #[serde(default = "default_restart_helper")]
    pub restart: PathBuf,
    /// Status helper timeout in seconds.
    #[serde(default = "default_status_timeout")]
    pub status_timeout_seconds: u64,
    /// Start/stop/restart helper timeout in seconds.
    #[serde(default = "default_action_timeout")]
    pub action_timeout_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("/etc/svcmgr/services.yaml")
}

fn default_service() -> String {
    "pzserver".to_string()
}

fn default_use_escalation() -> bool {
    true
}

fn default_escalation_wrapper() -> PathBuf {
    PathBuf::from("/usr/bin/sudo")
}

fn default_escalation_args() -> Vec<String> {
    vec!["-n".to_string()]
}

fn default_status_helper() -> PathBuf {
    PathBuf::from("/usr/local/bin/service-manager-status")
}

fn default_start_helper() -> PathBuf {
    PathBuf::from("/usr/local/bin/service-manager-start")
}

fn default_stop_helper() -> PathBuf {
    PathBuf::from("/usr/local/bin/service-manager-stop")
}

fn default_restart_helper() -> PathBuf {
    PathBuf::from("/usr/local/bin/service-manager-restart")
}

fn default_status_timeout() -> u64 {
    10
}

fn default_action_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    65_536
}

fn default_max_concurrent() -> usize {
    32
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/svcmgr/audit.log")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            default_service: default_service(),
        }
    }
}

impl Default for HelpersConfig {
    fn default() -> Self {
        Self {
            use_escalation: default_use_escalation(),
            escalation_wrapper: default_escalation_wrapper(),
            escalation_args: default_escalation_args(),
            status: default_status_helper(),
            start: default_start_helper(),
            stop: default_stop_helper(),
            restart: default_restart_helper(),
            status_timeout_seconds: default_status_timeout(),
            action_timeout_seconds: default_action_timeout(),
        }
    }
}

impl HelpersConfig {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_seconds)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_seconds)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> DaemonResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            DaemonError::Config { message } => DaemonError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> DaemonResult<Self> {
        let settings: Settings = toml::from_str(content).map_err(|e| DaemonError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> DaemonResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.socket.permissions.is_empty()
            || !self.socket.permissions.chars().all(|c| ('0'..='7').contains(&c))
        {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        // Helpers run with elevated privilege; a relative path would resolve
        // through PATH of whoever launched the daemon.
        let helpers = &self.helpers;
        let mut programs = vec![
            ("status", &helpers.status),
            ("start", &helpers.start),
            ("stop", &helpers.stop),
            ("restart", &helpers.restart),
        ];
        if helpers.use_escalation {
            programs.push(("escalation_wrapper", &helpers.escalation_wrapper));
        }
        for (name, program) in programs {
            if !program.is_absolute() {
                return Err(DaemonError::Config {
                    message: format!(
                        "Helper '{}' must be an absolute path, got '{}'",
                        name,
                        program.display()
                    ),
                });
            }
        }

        if helpers.status_timeout_seconds == 0 || helpers.action_timeout_seconds == 0 {
            return Err(DaemonError::Config {
                message: "Helper timeouts must be greater than zero".to_string(),
            });
        }

        if self.limits.max_concurrent_requests == 0 {
            return Err(DaemonError::Config {
                message: "max_concurrent_requests must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
