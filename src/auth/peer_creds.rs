//! Peer credential verification using SO_PEERCRED.

use std::os::fd::AsFd;

use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
use serde::Serialize;

use crate::error::{AuthErrorKind, DaemonError};

/// Credentials of the process on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeerInfo {
    pub uid: u32,
    pub gid: u32,
    pub pid: i32,
}

/// Check `peer` against the allowed UIDs. An empty list allows nobody.
pub fn authorize_peer(peer: PeerInfo, allowed_uids: &[u32]) -> Result<PeerInfo, DaemonError> {
    if allowed_uids.contains(&peer.uid) {
        Ok(peer)
    } else {
        Err(DaemonError::Auth {
            kind: AuthErrorKind::UnauthorizedPeer { uid: peer.uid },
        })
    }
}

/// Read the peer's credentials from `stream` and authorize them.
pub fn verify_peer<S: AsFd>(stream: &S, allowed_uids: &[u32]) -> Result<PeerInfo, DaemonError> {
    let creds = getsockopt(stream, PeerCredentials).map_err(|e| DaemonError::Socket {
        message: format!("Failed to get peer credentials: {}", e),
    })?;

    authorize_peer(
        PeerInfo {
            uid: creds.uid(),
            gid: creds.gid(),
            pid: creds.pid(),
        },
        allowed_uids,
    )
}
