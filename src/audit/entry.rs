//! Audit entry types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::PeerInfo;

/// One audited request.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp with millisecond precision.
    pub timestamp: String,
    pub request_id: Uuid,
    pub command: String,
    /// Target service, when the request resolved one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Requested action, as sent by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub peer_uid: u32,
    pub peer_gid: u32,
    pub peer_pid: i32,
    pub result: AuditResult,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Start an entry for `command` issued by `peer` at `at`.
    ///
    /// The result defaults to success until [`AuditEntry::failed`] is applied.
    pub fn new(at: DateTime<Utc>, request_id: Uuid, command: impl Into<String>, peer: PeerInfo) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id,
            command: command.into(),
            service: None,
            action: None,
            peer_uid: peer.uid,
            peer_gid: peer.gid,
            peer_pid: peer.pid,
            result: AuditResult::Success { message: None },
            duration_ms: 0,
        }
    }

    pub fn service(mut self, service: Option<String>) -> Self {
        self.service = service;
        self
    }

    pub fn action(mut self, action: Option<String>) -> Self {
        self.action = action;
        self
    }

    pub fn succeeded(mut self, message: Option<String>) -> Self {
        self.result = AuditResult::Success { message };
        self
    }

    pub fn failed(mut self, error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        self.result = AuditResult::Failure {
            error_code: error_code.into(),
            error_message: error_message.into(),
        };
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Outcome of an audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditResult {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Failure {
        error_code: String,
        error_message: String,
    },
}
