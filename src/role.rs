//! Role model.
//!
//! `Role` is the single source of truth for authority. The legacy
//! `is_staff`/`is_superuser` pair is derived on every read so the two can
//! never drift apart.

use crate::error::{Error, Result};
use std::str::FromStr;

pub use crate::orm::users::Role;

/// Flags derived from a role.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoleFlags {
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Admin elevates both flags, moderator is staff only, student neither.
    pub fn flags(self) -> RoleFlags {
        RoleFlags {
            is_staff: matches!(self, Role::Moderator | Role::Admin),
            is_superuser: matches!(self, Role::Admin),
        }
    }

    pub fn is_staff(self) -> bool {
        self.flags().is_staff
    }

    pub fn is_superuser(self) -> bool {
        self.flags().is_superuser
    }

    /// Students and moderators belong to a course; admins never do.
    pub fn requires_course(self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::validation("Invalid role")),
        }
    }
}

/// Enforces the course-presence invariant for a role.
pub fn check_course_invariant(role: Role, course_id: Option<i32>) -> Result<()> {
    match (role.requires_course(), course_id) {
        (true, None) => Err(Error::validation(format!(
            "A {} must belong to a course",
            role
        ))),
        (false, Some(_)) => Err(Error::validation("An admin cannot belong to a course")),
        _ => Ok(()),
    }
}

/// Refuses a change that takes away the last active admin.
///
/// `active_admins` must be counted inside the same write scope as the change.
/// Inactive admins do not count and removing one is always allowed.
pub fn check_admin_removal(
    current: Role,
    is_active: bool,
    removes_admin: bool,
    active_admins: u64,
) -> Result<()> {
    if current == Role::Admin && is_active && removes_admin && active_admins <= 1 {
        return Err(Error::CannotRemoveLastAdmin);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_role() {
        assert_eq!(
            Role::Admin.flags(),
            RoleFlags {
                is_staff: true,
                is_superuser: true
            }
        );
        assert_eq!(
            Role::Moderator.flags(),
            RoleFlags {
                is_staff: true,
                is_superuser: false
            }
        );
        assert_eq!(
            Role::Student.flags(),
            RoleFlags {
                is_staff: false,
                is_superuser: false
            }
        );
    }

    #[test]
    fn test_parse_role() {
        assert_eq!("Moderator".parse::<Role>().unwrap(), Role::Moderator);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_course_invariant() {
        assert!(check_course_invariant(Role::Student, Some(1)).is_ok());
        assert!(check_course_invariant(Role::Moderator, Some(1)).is_ok());
        assert!(check_course_invariant(Role::Admin, None).is_ok());
        assert!(check_course_invariant(Role::Student, None).is_err());
        assert!(check_course_invariant(Role::Moderator, None).is_err());
        assert!(check_course_invariant(Role::Admin, Some(1)).is_err());
    }

    #[test]
    fn test_last_admin_guard() {
        assert!(matches!(
            check_admin_removal(Role::Admin, true, true, 1),
            Err(Error::CannotRemoveLastAdmin)
        ));
        assert!(check_admin_removal(Role::Admin, true, true, 2).is_ok());
        assert!(check_admin_removal(Role::Admin, true, false, 1).is_ok());
        assert!(check_admin_removal(Role::Admin, false, true, 1).is_ok());
        assert!(check_admin_removal(Role::Moderator, true, true, 0).is_ok());
    }
}
