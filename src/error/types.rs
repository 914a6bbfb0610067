//! Error types for the service manager daemon.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the daemon shell (config, socket, protocol, commands).
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// Command dispatch errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Refusals from the control facade.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DaemonError {
    /// Error code reported to socket clients.
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::Control(e) => e.code(),
            DaemonError::Command {
                kind: CommandErrorKind::UnknownCommand { .. },
            } => "UNKNOWN_COMMAND",
            DaemonError::Command { .. } | DaemonError::Protocol { .. } => "INVALID_REQUEST",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Command dispatch error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Unauthorized peer: UID {uid} not in allowed list")]
    UnauthorizedPeer { uid: u32 },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

/// Service name validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Service name cannot be empty")]
    EmptyServiceName,

    #[error("Service name too long: {len} bytes exceeds maximum of {max} bytes")]
    ServiceNameTooLong { len: usize, max: usize },

    #[error("Service name must start with a letter or digit: {name}")]
    InvalidLeadingCharacter { name: String },

    #[error("Invalid character {ch:?} in service name: {name}")]
    InvalidCharacter { name: String, ch: char },
}

/// Failure to read the service registry source.
///
/// Never surfaced past the registry: the loader logs it and substitutes the
/// built-in fallback service.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry file '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors surfaced to callers of the control facade.
///
/// Timeouts and helper failures are not errors here; they travel as
/// [`StatusValue`](crate::executor::StatusValue) and
/// [`ActionOutcome`](crate::executor::ActionOutcome) values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Service not found: {service}")]
    NotFound { service: String },

    #[error("Action not permitted for this service: {action} on {service}")]
    PermissionDenied { service: String, action: String },

    #[error("Invalid action: {action}")]
    InvalidAction { action: String },
}

impl ControlError {
    /// Stable error code used on the control socket.
    pub fn code(&self) -> &'static str {
        match self {
            ControlError::NotFound { .. } => "NOT_FOUND",
            ControlError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ControlError::InvalidAction { .. } => "INVALID_ACTION",
        }
    }
}

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
