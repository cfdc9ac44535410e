pub mod announcements;
pub mod chat;
pub mod documents;
pub mod meetings;
pub mod upload;

use crate::error::ApiError;
use crate::roles::Role;

/// Parse a client-supplied role string or reject the request.
pub fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| {
        ApiError::Validation(format!(
            "unknown role '{}', expected student, teacher or hod_dean",
            raw
        ))
    })
}
