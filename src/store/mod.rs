//! Persistence abstraction for the note core.
//!
//! Two backends implement [`NoteStore`]:
//! - [`DbStore`]: SeaORM over PostgreSQL or SQLite
//! - [`MemoryStore`]: a single-lock in-process store
//!
//! Writes that depend on a decision (moderation transitions, role and
//! activation changes) take the decision as a callback. The backend reads
//! the fresh row, calls the decision and writes the result inside one write
//! scope, so no other writer can slip in between.

pub mod db;
pub mod memory;

pub use db::DbStore;
pub use memory::MemoryStore;

use crate::engagement::{Comment, NewComment};
use crate::error::Result;
use crate::filter::NoteFilter;
use crate::moderation::Transition;
use crate::note::{Course, NewNote, Note, NoteAction, Subject};
use crate::user::{NewUser, RoleAssignment, User};
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Decides a moderation transition from the fresh note.
pub type TransitionFn<'a> = dyn Fn(&Note) -> Result<Transition> + Send + Sync + 'a;

/// Decides a role change from the fresh target and the active admin count.
pub type RoleChangeFn<'a> = dyn Fn(&User, u64) -> Result<RoleAssignment> + Send + Sync + 'a;

/// Approves an activation change from the fresh target and the active admin count.
pub type ActivationFn<'a> = dyn Fn(&User, u64) -> Result<()> + Send + Sync + 'a;

#[derive(Clone, Debug)]
pub struct NewSubject {
    pub name: String,
    pub course_id: Option<i32>,
    pub is_major: bool,
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert_course(
        &self,
        name: &str,
        description: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<Course>;

    async fn find_course(&self, id: i32) -> Result<Option<Course>>;

    async fn insert_subject(&self, subject: NewSubject) -> Result<Subject>;

    async fn find_subject(&self, id: i32) -> Result<Option<Subject>>;

    /// General subjects plus those of `course_id`, by name then id.
    async fn subjects_for(&self, course_id: Option<i32>) -> Result<Vec<Subject>>;

    /// Inserts a user and its empty profile atomically.
    ///
    /// The email is stored trimmed and lowercased. A taken school id or email
    /// is a `Validation` error.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn find_user(&self, id: i32) -> Result<Option<User>>;

    async fn count_users(&self) -> Result<u64>;

    /// Whether any admin exists, active or not.
    async fn any_admin(&self) -> Result<bool>;

    /// Applies a role change decided against the fresh row.
    async fn update_role(&self, user_id: i32, decide: &RoleChangeFn<'_>) -> Result<User>;

    /// Flips the active flag if `decide` allows it.
    async fn set_active(
        &self,
        user_id: i32,
        active: bool,
        decide: &ActivationFn<'_>,
    ) -> Result<User>;

    async fn insert_note(&self, note: NewNote) -> Result<Note>;

    /// Fetches a note, deleted or not.
    async fn find_note(&self, id: i32) -> Result<Option<Note>>;

    /// Notes matching `filter`, newest upload first, ties by ascending id.
    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>>;

    async fn count_notes(&self, filter: &NoteFilter) -> Result<u64>;

    /// Writes the decided note state and its audit entry as one unit.
    async fn transition(&self, note_id: i32, decide: &TransitionFn<'_>) -> Result<Note>;

    /// Audit entries of a note, oldest first.
    async fn note_actions(&self, note_id: i32) -> Result<Vec<NoteAction>>;

    /// Returns whether the note is liked after the toggle.
    async fn toggle_like(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool>;

    async fn count_likes(&self, note_id: i32) -> Result<u64>;

    /// Returns whether the note is saved after the toggle.
    async fn toggle_save(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool>;

    /// Approved, live notes saved by the user, in listing order.
    async fn saved_notes(&self, user_id: i32) -> Result<Vec<Note>>;

    /// Inserts or replaces the user's rating of a note.
    async fn upsert_rating(
        &self,
        note_id: i32,
        user_id: i32,
        value: i32,
        now: NaiveDateTime,
    ) -> Result<()>;

    /// All `(user_id, value)` ratings of a note.
    async fn ratings(&self, note_id: i32) -> Result<Vec<(i32, i32)>>;

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;

    async fn find_comment(&self, id: i32) -> Result<Option<Comment>>;

    /// Comments of a note, oldest first, ties by ascending id.
    async fn comments(&self, note_id: i32) -> Result<Vec<Comment>>;
}
