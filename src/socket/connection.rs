//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::auth::{verify_peer, PeerInfo};
use crate::commands::{CommandParams, CommandResult, ExecutionContext};
use crate::error::{DaemonError, ProtocolErrorKind};
use crate::protocol::{read_message_with_timeout, write_message_with_timeout, ControlRequest, Response};

use super::listener::{ConnectionMetrics, ServingState};

/// Handle a single client connection until it closes.
///
/// The peer is authorized before any request is read. One connection may
/// carry any number of requests.
pub async fn handle_connection(
    stream: UnixStream,
    state: Arc<ServingState>,
    metrics: Arc<ConnectionMetrics>,
) -> Result<(), DaemonError> {
    let peer = verify_peer(&stream, &state.settings.security.allowed_peer_uids)?;
    debug!(uid = peer.uid, gid = peer.gid, pid = peer.pid, "Peer authenticated");

    let (mut reader, mut writer) = stream.into_split();

    loop {
        match process_request(&mut reader, &mut writer, &state, &peer).await {
            Ok(success) => metrics.record_request(success),
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!(uid = peer.uid, "Client disconnected");
                return Ok(());
            }
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                debug!(uid = peer.uid, "Idle connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one request, dispatch it and write the response.
///
/// Returns whether the request succeeded.
async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    state: &ServingState,
    peer: &PeerInfo,
) -> Result<bool, DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limits = &state.settings.limits;
    let socket_timeout = Duration::from_secs(limits.socket_timeout_seconds);
    let msg = read_message_with_timeout(reader, limits.max_message_size, socket_timeout).await?;

    let request_id = Uuid::new_v4();

    let response = match serde_json::from_slice::<ControlRequest>(&msg) {
        Ok(request) => dispatch(state, peer, request_id, request).await,
        Err(e) => {
            warn!(request_id = %request_id, uid = peer.uid, error = %e, "Malformed request");
            Response::error_with_id(request_id, "INVALID_REQUEST", format!("Invalid JSON: {}", e))
        }
    };

    let success = response.success;
    let response_bytes = serde_json::to_vec(&response)?;
    write_message_with_timeout(writer, &response_bytes, socket_timeout).await?;

    Ok(success)
}

/// Run a request on the blocking pool and build its response.
async fn dispatch(
    state: &ServingState,
    peer: &PeerInfo,
    request_id: Uuid,
    request: ControlRequest,
) -> Response {
    let start_time = Instant::now();

    info!(
        request_id = %request_id,
        command = %request.command,
        uid = peer.uid,
        "Received request"
    );

    let params = CommandParams::new(request.params);

    // Resolved before dispatch so refused requests are audited with their target.
    let audit = state
        .commands
        .get(&request.command)
        .filter(|cmd| cmd.requires_audit())
        .map(|cmd| {
            AuditEntry::new(Utc::now(), request_id, request.command.clone(), *peer)
                .service(cmd.target_service(&params))
                .action(cmd.requested_action(&params))
        });

    let ctx = ExecutionContext::new(request_id, *peer);

    let commands = Arc::clone(&state.commands);
    let command_name = request.command.clone();
    let result =
        tokio::task::spawn_blocking(move || commands.dispatch(&ctx, &command_name, params)).await;

    let response = match result {
        Ok(Ok(cmd_result)) => {
            info!(
                request_id = %request_id,
                command = %request.command,
                success = cmd_result.success,
                "Command executed"
            );
            command_response(request_id, cmd_result)
        }
        Ok(Err(e)) => {
            warn!(
                request_id = %request_id,
                command = %request.command,
                code = e.code(),
                error = %e,
                "Command refused"
            );
            Response::error_with_id(request_id, e.code(), e.to_string())
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                command = %request.command,
                error = %e,
                "Command task panicked"
            );
            Response::error_with_id(request_id, "INTERNAL_ERROR", "Command execution failed")
        }
    };

    if let (Some(logger), Some(entry)) = (state.audit_logger.as_ref(), audit) {
        let entry = match &response.error {
            None => entry.succeeded(
                response
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
            ),
            Some(err) => entry.failed(err.code.clone(), err.message.clone()),
        };
        let entry = entry.duration_ms(start_time.elapsed().as_millis() as u64);
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }

    response
}

fn command_response(request_id: Uuid, result: CommandResult) -> Response {
    if result.success {
        Response::success_with_id(request_id, result.data.unwrap_or_else(|| serde_json::json!({})))
    } else {
        Response::error_with_id(
            request_id,
            result.error_code.unwrap_or_else(|| "INTERNAL_ERROR".to_string()),
            result.error_message.unwrap_or_else(|| "Unknown error".to_string()),
        )
        .with_data(result.data)
    }
}
