//! Error kinds surfaced to callers of the note core.
//!
//! Every failure is per-request. The only locally recovered failure is the
//! best-effort notification send, which has its own error type in
//! `crate::notifications`.

use sea_orm::DbErr;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a moderation transition.
pub type TransitionError = Error;

/// Failure of a role or activation change.
pub type RoleChangeError = Error;

#[derive(Debug)]
pub enum Error {
    /// Input failed validation (blank reason, blank title, bad visibility, ...)
    Validation(String),
    /// A view, edit or moderate check failed
    PermissionDenied(String),
    /// The event is not legal from the note's current state
    InvalidTransition(String),
    /// The change would leave the system without an active admin
    CannotRemoveLastAdmin,
    /// The record does not exist or is soft-deleted
    NotFound(String),
    /// Store failure
    Database(DbErr),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Error::PermissionDenied(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Short machine-readable kind, for logs and API layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::PermissionDenied(_) => "permission_denied",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::CannotRemoveLastAdmin => "cannot_remove_last_admin",
            Error::NotFound(_) => "not_found",
            Error::Database(_) => "database_error",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            Error::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            Error::CannotRemoveLastAdmin => write!(f, "Cannot remove the last admin."),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbErr> for Error {
    fn from(e: DbErr) -> Self {
        match e {
            DbErr::RecordNotFound(what) => Error::NotFound(what),
            e => Error::Database(e),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(e: validator::ValidationErrors) -> Self {
        Error::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_messages() {
        assert_eq!(Error::validation("blank").kind(), "validation_error");
        assert_eq!(Error::denied("no").kind(), "permission_denied");
        assert_eq!(Error::CannotRemoveLastAdmin.kind(), "cannot_remove_last_admin");
        assert_eq!(
            Error::CannotRemoveLastAdmin.to_string(),
            "Cannot remove the last admin."
        );
    }

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let e: Error = DbErr::RecordNotFound("note 3".to_string()).into();
        assert!(matches!(e, Error::NotFound(ref what) if what == "note 3"));
        assert_eq!(e.kind(), "not_found");

        let e: Error = DbErr::Custom("boom".to_string()).into();
        assert_eq!(e.kind(), "database_error");
    }
}
