//! Audit log of service actions.
//!
//! Every start/stop/restart request, allowed or refused, is appended to the
//! audit file as one JSON object per line. Listing and status queries are
//! not audited.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditResult};
pub use logger::AuditLogger;
