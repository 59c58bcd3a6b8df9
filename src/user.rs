use crate::error::{Error, Result};
use crate::orm::users;
use crate::role::{check_admin_removal, check_course_invariant, Role, RoleFlags};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Student identifiers look like `1234-5678-H`.
pub static SCHOOL_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{4}-H$").expect("school id pattern is a valid regex")
});

/// A user as seen by the authorization core.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: i32,
    pub school_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub course_id: Option<i32>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn flags(&self) -> RoleFlags {
        self.role.flags()
    }

    /// "First Last", or the school id when no name is on record.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.school_id.to_owned()
        } else {
            full.to_owned()
        }
    }
}

impl From<users::Model> for User {
    fn from(m: users::Model) -> Self {
        Self {
            id: m.id,
            school_id: m.school_id,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            role: m.role,
            course_id: m.course_id,
            is_active: m.is_active,
            created_at: m.created_at,
        }
    }
}

/// A user row ready to be inserted along with its profile.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub school_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub course_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegistrationForm {
    pub school_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    #[validate(length(max = 1000))]
    pub password: String,
    pub confirm_password: String,
    pub course_id: i32,
}

impl RegistrationForm {
    /// Field checks that need no store access.
    pub fn check(&self, min_password_length: usize) -> Result<()> {
        self.validate()?;
        validate_school_id(self.school_id.trim())?;

        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(Error::validation("First and last name are required"));
        }
        if self.password.chars().count() < min_password_length {
            return Err(Error::validation(format!(
                "Password must be at least {} characters",
                min_password_length
            )));
        }
        if self.password != self.confirm_password {
            return Err(Error::validation("Passwords do not match"));
        }

        Ok(())
    }
}

pub fn validate_school_id(school_id: &str) -> Result<()> {
    if SCHOOL_ID_REGEX.is_match(school_id) {
        Ok(())
    } else {
        Err(Error::validation(
            "School ID must be in the format NNNN-NNNN-H (e.g. 1234-5678-H).",
        ))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            Error::validation("Password could not be hashed")
        })
}

/// Field values written by a role change.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleAssignment {
    pub role: Role,
    pub course_id: Option<i32>,
    /// Admins carry no name fields.
    pub clear_names: bool,
}

impl RoleAssignment {
    pub fn apply(&self, user: &mut User) {
        user.role = self.role;
        user.course_id = self.course_id;
        if self.clear_names {
            user.first_name.clear();
            user.last_name.clear();
        }
    }
}

/// Decides the outcome of moving `target` to `new_role`.
///
/// `course_id` supplies the course when the target has none (an admin being
/// demoted); otherwise the target keeps the course on record.
/// `active_admins` must be read in the same write scope that applies the result.
pub fn plan_role_change(
    target: &User,
    new_role: Role,
    course_id: Option<i32>,
    active_admins: u64,
) -> Result<RoleAssignment> {
    check_admin_removal(
        target.role,
        target.is_active,
        new_role != Role::Admin,
        active_admins,
    )?;

    let course_id = if new_role.requires_course() {
        course_id.or(target.course_id)
    } else {
        None
    };
    check_course_invariant(new_role, course_id)?;

    Ok(RoleAssignment {
        role: new_role,
        course_id,
        clear_names: new_role == Role::Admin,
    })
}

/// Decides whether `target` may be switched to `active`.
pub fn plan_activation(target: &User, active: bool, active_admins: u64) -> Result<()> {
    check_admin_removal(target.role, target.is_active, !active, active_admins)
}
