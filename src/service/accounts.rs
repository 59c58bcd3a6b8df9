use super::NoteService;
use crate::error::{Error, Result};
use crate::role::Role;
use crate::user::{
    hash_password, plan_activation, plan_role_change, validate_school_id, NewUser,
    RegistrationForm, User,
};
use chrono::Utc;

impl NoteService {
    /// Registers a student and its profile.
    pub async fn register(&self, form: RegistrationForm) -> Result<User> {
        form.check(self.min_password_length)?;

        if self.store.find_course(form.course_id).await?.is_none() {
            return Err(Error::validation("Selected course does not exist"));
        }

        let user = self
            .store
            .insert_user(NewUser {
                school_id: form.school_id.trim().to_owned(),
                email: form.email.trim().to_lowercase(),
                first_name: form.first_name.trim().to_owned(),
                last_name: form.last_name.trim().to_owned(),
                password_hash: hash_password(&form.password)?,
                role: Role::Student,
                course_id: Some(form.course_id),
                created_at: Utc::now().naive_utc(),
            })
            .await?;

        log::info!("Registered user {} ({})", user.id, user.school_id);
        Ok(user)
    }

    /// Creates the first admin. Returns `None` when an admin already exists.
    pub async fn bootstrap_admin(
        &self,
        school_id: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<User>> {
        if self.store.any_admin().await? {
            log::info!("Admin already exists, skipping bootstrap");
            return Ok(None);
        }

        let school_id = school_id.trim();
        let email = email.trim().to_lowercase();
        validate_school_id(school_id)?;
        if !validator::validate_email(&email) {
            return Err(Error::validation("Enter a valid email address"));
        }
        if password.chars().count() < self.min_password_length {
            return Err(Error::validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        let user = self
            .store
            .insert_user(NewUser {
                school_id: school_id.to_owned(),
                email,
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(password)?,
                role: Role::Admin,
                course_id: None,
                created_at: Utc::now().naive_utc(),
            })
            .await?;

        log::info!("Bootstrap admin {} created", user.school_id);
        Ok(Some(user))
    }

    /// Moves `target_id` to `new_role`.
    ///
    /// `course_id` is needed when demoting an admin, who has no course on
    /// record. The last active admin cannot be demoted.
    pub async fn change_role(
        &self,
        actor: &User,
        target_id: i32,
        new_role: Role,
        course_id: Option<i32>,
    ) -> Result<User> {
        require_admin(actor)?;

        if let Some(course_id) = course_id {
            if self.store.find_course(course_id).await?.is_none() {
                return Err(Error::validation("Selected course does not exist"));
            }
        }

        let decide = |target: &User, active_admins: u64| {
            plan_role_change(target, new_role, course_id, active_admins)
        };
        let user = match self.store.update_role(target_id, &decide).await {
            Ok(user) => user,
            Err(e) => {
                log::warn!(
                    "Role change of user {} to {} by {} refused: {}",
                    target_id,
                    new_role,
                    actor.id,
                    e
                );
                return Err(e);
            }
        };

        log::info!("User {} is now {} (changed by {})", user.id, user.role, actor.id);
        Ok(user)
    }

    /// Activates or deactivates an account. The last active admin stays active.
    pub async fn set_active(&self, actor: &User, target_id: i32, active: bool) -> Result<User> {
        require_admin(actor)?;

        let decide =
            |target: &User, active_admins: u64| plan_activation(target, active, active_admins);
        let user = self.store.set_active(target_id, active, &decide).await?;

        log::info!(
            "User {} {} by {}",
            user.id,
            if active { "activated" } else { "deactivated" },
            actor.id
        );
        Ok(user)
    }
}

fn require_admin(actor: &User) -> Result<()> {
    if actor.is_active && actor.is_admin() {
        Ok(())
    } else {
        Err(Error::denied("Only admins can manage accounts"))
    }
}
