//! Service name validation.
//!
//! Validates that a service name is safe to hand to a helper as a single
//! positional argument.

use crate::error::ValidationError;

/// Maximum service name length in bytes (systemd's unit name limit).
pub const MAX_SERVICE_NAME_LEN: usize = 256;

/// Characters allowed after the first one, besides ASCII alphanumerics.
const EXTRA_CHARS: &[char] = &['-', '_', '.', '@', ':'];

/// Validate a service name.
///
/// Names must start with an ASCII letter or digit (so a helper can never see
/// them as an option) and may then contain letters, digits, and `-_.@:`.
///
/// # Example
///
/// ```
/// use svcmgr_daemon::validation::validate_service_name;
///
/// assert!(validate_service_name("nginx").is_ok());
/// assert!(validate_service_name("getty@tty1").is_ok());
/// assert!(validate_service_name("--help").is_err());
/// ```
pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyServiceName);
    }

    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(ValidationError::ServiceNameTooLong {
            len: name.len(),
            max: MAX_SERVICE_NAME_LEN,
        });
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphanumeric() {
            return Err(ValidationError::InvalidLeadingCharacter {
                name: name.to_string(),
            });
        }
    }

    if let Some(ch) = chars.find(|c| !c.is_ascii_alphanumeric() && !EXTRA_CHARS.contains(c)) {
        return Err(ValidationError::InvalidCharacter {
            name: name.to_string(),
            ch,
        });
    }

    Ok(())
}
