//! Service definition types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximal action class granted for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Start,
    Stop,
    #[default]
    Restart,
    All,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Start => "start",
            PermissionLevel::Stop => "stop",
            PermissionLevel::Restart => "restart",
            PermissionLevel::All => "all",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action that can be requested against a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

impl Action {
    /// The actions that change service state.
    pub const MUTATING: [Action; 3] = [Action::Start, Action::Stop, Action::Restart];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Status => "status",
        }
    }

    /// Present participle, for messages like "Timeout while stopping service".
    pub fn progressive(&self) -> &'static str {
        match self {
            Action::Start => "starting",
            Action::Stop => "stopping",
            Action::Restart => "restarting",
            Action::Status => "checking",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Status)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action '{}'", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "restart" => Ok(Action::Restart),
            "status" => Ok(Action::Status),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// One manageable service as declared in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    /// Registry key, also the sole argument passed to helpers.
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permission_level: PermissionLevel,
    pub status_check_allowed: bool,
}

impl ServiceDefinition {
    /// A definition with the registry defaults applied.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            permission_level: PermissionLevel::default(),
            status_check_allowed: true,
        }
    }

    pub fn with_permission_level(mut self, level: PermissionLevel) -> Self {
        self.permission_level = level;
        self
    }

    pub fn with_status_check_allowed(mut self, allowed: bool) -> Self {
        self.status_check_allowed = allowed;
        self
    }
}
