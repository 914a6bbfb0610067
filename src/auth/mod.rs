//! Peer authentication.
//!
//! Connections are authorized by the UID of the connecting process, read
//! from the socket with `SO_PEERCRED`.

mod peer_creds;

pub use peer_creds::{authorize_peer, verify_peer, PeerInfo};
