//! Request types for the control protocol.

use serde::{Deserialize, Serialize};

/// A request from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    /// The command to execute (e.g., "services.list", "service.restart").
    pub command: String,

    /// Command parameters as a JSON object.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::json!({})
}

impl ControlRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: empty_params(),
        }
    }

    /// Add a parameter to the request.
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Some(obj) = self.params.as_object_mut() {
            obj.insert(key.to_string(), value.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default_to_empty_object() {
        let request: ControlRequest =
            serde_json::from_str(r#"{"command": "services.list"}"#).unwrap();
        assert_eq!(request.command, "services.list");
        assert_eq!(request.params, serde_json::json!({}));
    }

    #[test]
    fn test_with_param() {
        let request = ControlRequest::new("service.action")
            .with_param("service", "web")
            .with_param("action", "stop");
        assert_eq!(
            request.params,
            serde_json::json!({"service": "web", "action": "stop"})
        );

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"command\":\"service.action\""));
    }
}
