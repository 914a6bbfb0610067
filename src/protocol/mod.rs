//! Wire protocol module.
//!
//! Defines request/response types and message framing for socket communication.
//!
//! ## Wire Format
//!
//! Messages are length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON payload]
//! ```
//!
//! A request names a command and its parameters:
//! ```json
//! {"command": "service.restart", "params": {"service": "web"}}
//! ```

mod request;
mod response;
mod wire;

pub use request::ControlRequest;
pub use response::{ErrorResponse, Response};
pub use wire::{read_message, read_message_with_timeout, write_message, write_message_with_timeout};
