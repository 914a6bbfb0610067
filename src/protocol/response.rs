//! Response types for the control protocol.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Message sent to clients for a given error code.
///
/// Domain refusals and helper failures carry their own message. Anything
/// else is replaced with a generic one; the original is only logged.
fn client_message(code: &str, original: String) -> String {
    match code {
        "NOT_FOUND" | "PERMISSION_DENIED" | "INVALID_ACTION" | "ACTION_FAILED"
        | "UNKNOWN_COMMAND" | "INVALID_REQUEST" => original,
        _ => "Internal server error".to_string(),
    }
}

/// A response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,

    /// Unique identifier for this request/response pair.
    pub request_id: Uuid,

    /// Response data. Present on success, and on helper failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error details on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "PERMISSION_DENIED", "NOT_FOUND").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl Response {
    /// Create a success response with a specific request ID.
    pub fn success_with_id(request_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            success: true,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response with a specific request ID.
    ///
    /// Messages for internal errors are replaced before reaching the client.
    pub fn error_with_id(
        request_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let original = message.into();

        debug!(
            request_id = %request_id,
            code = %code,
            message = %original,
            "Error response"
        );

        Self {
            success: false,
            request_id,
            data: None,
            error: Some(ErrorResponse {
                message: client_message(&code, original),
                code,
            }),
        }
    }

    /// Attach data to a response.
    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = Response::success_with_id(Uuid::nil(), serde_json::json!({"status": "active"}));
        assert!(response.success);
        assert_eq!(response.request_id, Uuid::nil());
        assert!(response.error.is_none());

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_domain_errors_keep_their_message() {
        let response = Response::error_with_id(
            Uuid::nil(),
            "PERMISSION_DENIED",
            "Action not permitted for this service: start on web",
        );
        assert!(!response.success);
        let error = response.error.unwrap();
        assert_eq!(error.code, "PERMISSION_DENIED");
        assert_eq!(
            error.message,
            "Action not permitted for this service: start on web"
        );
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let response = Response::error_with_id(
            Uuid::nil(),
            "INTERNAL_ERROR",
            "I/O error: No space left on device",
        );
        let error = response.error.unwrap();
        assert_eq!(error.message, "Internal server error");
    }

    #[test]
    fn test_protocol_codes_are_masked() {
        let response = Response::error_with_id(
            Uuid::nil(),
            "CONNECTION_TIMEOUT",
            "Connection timed out after 30s from uid 1000",
        );
        assert_eq!(response.error.unwrap().message, "Internal server error");
    }

    #[test]
    fn test_failure_with_data() {
        let response = Response::error_with_id(Uuid::nil(), "ACTION_FAILED", "Timeout while stopping service")
            .with_data(Some(serde_json::json!({"service": "web"})));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["service"], "web");
        assert_eq!(json["error"]["message"], "Timeout while stopping service");
    }
}
