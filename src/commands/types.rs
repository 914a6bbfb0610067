//! Command types: parameters, results, and execution context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::PeerInfo;
use crate::error::{CommandErrorKind, DaemonError};

/// Wrapper around command parameters with helper methods.
#[derive(Debug, Clone)]
pub struct CommandParams {
    inner: serde_json::Value,
}

impl CommandParams {
    /// Create new command parameters from a JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self { inner: value }
    }

    /// Get a required string parameter.
    pub fn get_string(&self, key: &str) -> Result<String, DaemonError> {
        self.get_optional_string(key)?
            .ok_or_else(|| DaemonError::Command {
                kind: CommandErrorKind::MissingParameter {
                    param: key.to_string(),
                },
            })
    }

    /// Get an optional string parameter.
    ///
    /// Absent and `null` are both `None`; any other non-string value is an
    /// error.
    pub fn get_optional_string(&self, key: &str) -> Result<Option<String>, DaemonError> {
        match self.inner.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(DaemonError::Command {
                kind: CommandErrorKind::InvalidParameter {
                    param: key.to_string(),
                    message: format!("expected a string, got {}", other),
                },
            }),
        }
    }

    /// Check if a parameter exists.
    pub fn has(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }
}

impl From<serde_json::Value> for CommandParams {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Result of command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,
    /// Result data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CommandResult {
    /// Create a success result with data.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: None,
            error_message: None,
        }
    }

    /// Create a failure result.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }

    /// Attach data to a result.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Execution context for a command.
///
/// Contains metadata about the request and the connected peer.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// Information about the connected peer.
    pub peer: PeerInfo,
}

impl ExecutionContext {
    /// Create a new execution context.
    pub fn new(request_id: Uuid, peer: PeerInfo) -> Self {
        Self { request_id, peer }
    }
}
