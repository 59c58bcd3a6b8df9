//! Role-scoped listing filters.
//!
//! A `NoteFilter` is a declarative predicate built from the requesting user
//! and a listing scope. It can be checked against a loaded note with
//! `matches` or turned into a SeaORM `Condition` over `notes` joined with
//! `subjects`. Both forms express the same rule.

use crate::error::{Error, Result};
use crate::note::{ModerationStatus, Note, Visibility};
use crate::orm::{notes, subjects};
use crate::role::Role;
use crate::user::User;
use sea_orm::{ActiveEnum, ColumnTrait, Condition};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Notes awaiting review.
    Pending,
    /// Notes already approved or rejected.
    Moderated,
    /// Approved notes the user can reach.
    Feed,
    /// The user's own uploads in any status.
    Own,
}

/// Which subjects a moderation queue covers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModerationScope {
    Unrestricted,
    /// Subjects of this course plus every general subject.
    CourseOrGeneral(Option<i32>),
}

/// Visibility gate for approved notes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisibilityReach {
    Unrestricted,
    PublicOnly,
    /// Public and school notes, course notes of `course_id`, and own notes.
    Member { user_id: i32, course_id: Option<i32> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NoteFilter {
    /// `None` matches every status.
    pub statuses: Option<Vec<ModerationStatus>>,
    pub uploader_id: Option<i32>,
    pub moderation: ModerationScope,
    pub reach: VisibilityReach,
    pub include_deleted: bool,
}

impl NoteFilter {
    /// Every live note.
    pub fn all() -> Self {
        Self {
            statuses: None,
            uploader_id: None,
            moderation: ModerationScope::Unrestricted,
            reach: VisibilityReach::Unrestricted,
            include_deleted: false,
        }
    }

    pub fn with_statuses(mut self, statuses: &[ModerationStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn with_uploader(mut self, uploader_id: i32) -> Self {
        self.uploader_id = Some(uploader_id);
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        if note.is_deleted && !self.include_deleted {
            return false;
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&note.status) {
                return false;
            }
        }
        if let Some(uploader_id) = self.uploader_id {
            if note.uploader_id != uploader_id {
                return false;
            }
        }

        let in_scope = match self.moderation {
            ModerationScope::Unrestricted => true,
            ModerationScope::CourseOrGeneral(course_id) => {
                note.subject.is_general()
                    || (course_id.is_some() && note.subject.course_id == course_id)
            }
        };

        let reachable = match self.reach {
            VisibilityReach::Unrestricted => true,
            VisibilityReach::PublicOnly => note.visibility == Visibility::Public,
            VisibilityReach::Member { user_id, course_id } => {
                note.uploader_id == user_id
                    || match note.visibility {
                        Visibility::Public | Visibility::School => true,
                        Visibility::Course => {
                            course_id.is_some() && note.subject.course_id == course_id
                        }
                    }
            }
        };

        in_scope && reachable
    }

    /// Condition for a `notes` query joined with `subjects`.
    pub fn to_condition(&self) -> Condition {
        let mut cond = Condition::all();

        if !self.include_deleted {
            cond = cond.add(notes::Column::IsDeleted.eq(false));
        }
        if let Some(statuses) = &self.statuses {
            cond = cond.add(notes::Column::Status.is_in(statuses.iter().map(|s| s.to_value())));
        }
        if let Some(uploader_id) = self.uploader_id {
            cond = cond.add(notes::Column::UploaderId.eq(uploader_id));
        }

        if let ModerationScope::CourseOrGeneral(course_id) = self.moderation {
            let mut scope = Condition::any().add(subjects::Column::CourseId.is_null());
            if let Some(course_id) = course_id {
                scope = scope.add(subjects::Column::CourseId.eq(course_id));
            }
            cond = cond.add(scope);
        }

        match self.reach {
            VisibilityReach::Unrestricted => {}
            VisibilityReach::PublicOnly => {
                cond = cond.add(notes::Column::Visibility.eq(Visibility::Public.to_value()));
            }
            VisibilityReach::Member { user_id, course_id } => {
                let mut reach = Condition::any()
                    .add(notes::Column::UploaderId.eq(user_id))
                    .add(notes::Column::Visibility.is_in([
                        Visibility::Public.to_value(),
                        Visibility::School.to_value(),
                    ]));
                if let Some(course_id) = course_id {
                    reach = reach.add(
                        Condition::all()
                            .add(notes::Column::Visibility.eq(Visibility::Course.to_value()))
                            .add(subjects::Column::CourseId.eq(course_id)),
                    );
                }
                cond = cond.add(reach);
            }
        }

        cond
    }
}

/// Builds the filter for `scope` as seen by `user`.
///
/// Deactivated users are handled as guests. Guests get the public feed and
/// nothing else; students cannot open either moderation queue.
pub fn build(user: Option<&User>, scope: ListScope) -> Result<NoteFilter> {
    let user = user.filter(|u| u.is_active);

    match scope {
        ListScope::Pending | ListScope::Moderated => {
            let user = user.ok_or_else(|| Error::denied("Sign in to moderate notes"))?;
            let moderation = match user.role {
                Role::Admin => ModerationScope::Unrestricted,
                Role::Moderator => ModerationScope::CourseOrGeneral(user.course_id),
                Role::Student => {
                    return Err(Error::denied("Only moderators and admins can moderate notes"))
                }
            };
            let statuses: &[ModerationStatus] = if scope == ListScope::Pending {
                &[ModerationStatus::Pending]
            } else {
                &[ModerationStatus::Approved, ModerationStatus::Rejected]
            };
            Ok(NoteFilter {
                moderation,
                ..NoteFilter::all()
            }
            .with_statuses(statuses))
        }
        ListScope::Feed => {
            let reach = match user {
                None => VisibilityReach::PublicOnly,
                Some(u) if u.is_admin() => VisibilityReach::Unrestricted,
                Some(u) => VisibilityReach::Member {
                    user_id: u.id,
                    course_id: u.course_id,
                },
            };
            Ok(NoteFilter {
                reach,
                ..NoteFilter::all()
            }
            .with_statuses(&[ModerationStatus::Approved]))
        }
        ListScope::Own => {
            let user = user.ok_or_else(|| Error::denied("Sign in to see your notes"))?;
            Ok(NoteFilter::all().with_uploader(user.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Subject;
    use crate::permission::{can_moderate, can_view};
    use chrono::Utc;

    fn user(id: i32, role: Role, course_id: Option<i32>) -> User {
        User {
            id,
            school_id: format!("2024-{:04}-H", id),
            email: format!("u{}@example.com", id),
            first_name: String::new(),
            last_name: String::new(),
            role,
            course_id,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn notes() -> Vec<Note> {
        let now = Utc::now().naive_utc();
        let mut out = Vec::new();
        let mut id = 0;
        for uploader_id in [10, 20] {
            for course_id in [None, Some(1), Some(2)] {
                for visibility in [Visibility::Public, Visibility::School, Visibility::Course] {
                    for status in [
                        ModerationStatus::Pending,
                        ModerationStatus::Approved,
                        ModerationStatus::Rejected,
                    ] {
                        for is_deleted in [false, true] {
                            id += 1;
                            out.push(Note {
                                id,
                                title: format!("note {}", id),
                                description: "d".to_string(),
                                content: None,
                                file: None,
                                uploader_id,
                                subject: Subject {
                                    id: course_id.unwrap_or(0),
                                    name: "s".to_string(),
                                    course_id,
                                    is_major: false,
                                },
                                visibility,
                                status,
                                rejection_reason: None,
                                is_deleted,
                                uploaded_at: now,
                                updated_at: now,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    fn users() -> Vec<User> {
        vec![
            user(1, Role::Admin, None),
            user(2, Role::Moderator, Some(1)),
            user(3, Role::Moderator, None),
            user(10, Role::Student, Some(1)),
            user(11, Role::Student, Some(2)),
        ]
    }

    #[test]
    fn test_feed_matches_view_rule_for_approved_notes() {
        for u in users() {
            let filter = build(Some(&u), ListScope::Feed).unwrap();
            for n in notes() {
                let expected = n.is_approved() && can_view(Some(&u), &n);
                assert_eq!(filter.matches(&n), expected, "user {} note {:?}", u.id, n);
            }
        }
    }

    #[test]
    fn test_guest_feed_is_public_only() {
        let filter = build(None, ListScope::Feed).unwrap();
        assert_eq!(filter.reach, VisibilityReach::PublicOnly);
        for n in notes() {
            assert_eq!(filter.matches(&n), n.is_approved() && can_view(None, &n));
        }
    }

    #[test]
    fn test_queues_match_moderation_rule() {
        for u in users().into_iter().filter(|u| !u.is_student()) {
            let pending = build(Some(&u), ListScope::Pending).unwrap();
            let moderated = build(Some(&u), ListScope::Moderated).unwrap();
            for n in notes() {
                let scoped = !n.is_deleted && can_moderate(&u, &n);
                assert_eq!(pending.matches(&n), scoped && n.is_pending());
                assert_eq!(moderated.matches(&n), scoped && !n.is_pending());
            }
        }
    }

    #[test]
    fn test_students_and_guests_have_no_queue() {
        let s = user(10, Role::Student, Some(1));
        for scope in [ListScope::Pending, ListScope::Moderated] {
            assert!(matches!(build(Some(&s), scope), Err(Error::PermissionDenied(_))));
            assert!(matches!(build(None, scope), Err(Error::PermissionDenied(_))));
        }
        assert!(build(None, ListScope::Own).is_err());
    }

    #[test]
    fn test_own_queue_ignores_status() {
        let s = user(10, Role::Student, Some(1));
        let filter = build(Some(&s), ListScope::Own).unwrap();
        for n in notes() {
            assert_eq!(filter.matches(&n), n.uploader_id == 10 && !n.is_deleted);
        }
    }

    #[test]
    fn test_inactive_user_is_a_guest() {
        let mut s = user(10, Role::Moderator, Some(1));
        s.is_active = false;
        assert_eq!(
            build(Some(&s), ListScope::Feed).unwrap().reach,
            VisibilityReach::PublicOnly
        );
        assert!(build(Some(&s), ListScope::Pending).is_err());
    }

    #[test]
    fn test_moderator_scope_condition_shape() {
        let m = user(2, Role::Moderator, Some(1));
        let filter = build(Some(&m), ListScope::Pending).unwrap();
        assert_eq!(filter.moderation, ModerationScope::CourseOrGeneral(Some(1)));
        // deleted flag, status and scope
        assert_eq!(filter.to_condition().len(), 3);
    }
}
