//! Unix socket server module.
//!
//! Accepts connections, authorizes peers and serves control requests.

mod connection;
mod listener;

pub use connection::handle_connection;
pub use listener::{ConnectionMetrics, ServingState, SocketListener};
