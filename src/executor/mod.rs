//! Command executor module.
//!
//! Runs the privileged helpers with bounded timeouts and turns their results
//! into status values and action outcomes.

mod output;
mod service;
mod subprocess;

pub use output::sanitize_output;
pub use service::{ActionOutcome, HelperCommands, ServiceExecutor, StatusValue};
pub use subprocess::{Invocation, ProcessRunner, Subprocess, SystemRunner};
