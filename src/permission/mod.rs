//! View, edit and moderate decisions for a (user, note) pair.
//!
//! These are pure functions over already-loaded data. A `None` user is a
//! guest. Deactivated accounts are treated as guests for viewing and can
//! never edit or moderate.

use crate::note::{Note, Subject, Visibility};
use crate::role::Role;
use crate::user::User;

fn active(user: Option<&User>) -> Option<&User> {
    user.filter(|u| u.is_active)
}

/// Whether `user` may act as moderator for notes filed under `subject`.
///
/// Admins cover everything. Moderators cover their own course plus every
/// general subject. Students cover nothing.
pub fn has_moderation_scope(user: &User, subject: &Subject) -> bool {
    if !user.is_active {
        return false;
    }
    match user.role {
        Role::Admin => true,
        Role::Moderator => {
            subject.is_general()
                || (user.course_id.is_some() && subject.course_id == user.course_id)
        }
        Role::Student => false,
    }
}

/// Whether the visibility of an approved note lets `user` through.
/// Owner and admin overrides are not part of this check.
pub fn visibility_reaches(user: Option<&User>, note: &Note) -> bool {
    match (note.visibility, active(user)) {
        (Visibility::Public, _) => true,
        (_, None) => false,
        (Visibility::School, Some(_)) => true,
        (Visibility::Course, Some(user)) => match (user.course_id, note.subject.course_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        },
    }
}

pub fn can_view(user: Option<&User>, note: &Note) -> bool {
    if note.is_deleted {
        return false;
    }

    let user = active(user);

    if note.is_approved() {
        if let Some(u) = user {
            if note.is_owned_by(u) || u.is_admin() {
                return true;
            }
        }
        return visibility_reaches(user, note);
    }

    // Pending and rejected notes stay with the uploader and the moderators.
    match user {
        Some(u) => note.is_owned_by(u) || has_moderation_scope(u, &note.subject),
        None => false,
    }
}

/// Only the uploader edits, and never a deleted note. Approved notes stay
/// editable; an edit sends them back to review.
pub fn can_edit(user: &User, note: &Note) -> bool {
    user.is_active && note.is_owned_by(user) && !note.is_deleted
}

pub fn can_moderate(user: &User, note: &Note) -> bool {
    has_moderation_scope(user, &note.subject)
}

/// The uploader or an admin may soft-delete.
pub fn can_delete(user: &User, note: &Note) -> bool {
    user.is_active && !note.is_deleted && (note.is_owned_by(user) || user.is_admin())
}
