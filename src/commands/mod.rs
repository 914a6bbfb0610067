//! Command handlers module.
//!
//! Maps socket command names onto the control facade.

mod registry;
mod traits;
mod types;

pub mod service;

pub use registry::CommandRegistry;
pub use traits::Command;
pub use types::{CommandParams, CommandResult, ExecutionContext};
