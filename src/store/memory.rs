//! In-memory `NoteStore`.
//!
//! All state sits behind one `RwLock`, so every write, including the
//! decide-then-write operations, is serialized against every other write.

use super::{ActivationFn, NewSubject, NoteStore, RoleChangeFn, TransitionFn};
use crate::engagement::{Comment, NewComment};
use crate::error::{Error, Result};
use crate::filter::NoteFilter;
use crate::note::{listing_order, Course, NewNote, Note, NoteAction, Subject};
use crate::role::Role;
use crate::user::{NewUser, User};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    next_id: i32,
    courses: BTreeMap<i32, Course>,
    subjects: BTreeMap<i32, Subject>,
    users: BTreeMap<i32, User>,
    passwords: HashMap<i32, String>,
    profiles: BTreeSet<i32>,
    notes: BTreeMap<i32, Note>,
    actions: Vec<NoteAction>,
    likes: BTreeMap<(i32, i32), NaiveDateTime>,
    saves: BTreeMap<(i32, i32), NaiveDateTime>,
    ratings: BTreeMap<(i32, i32), i32>,
    comments: BTreeMap<i32, Comment>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn active_admins(&self) -> u64 {
        self.users
            .values()
            .filter(|u| u.role == Role::Admin && u.is_active)
            .count() as u64
    }

    fn live_note(&self, note_id: i32) -> Result<&Note> {
        self.notes
            .get(&note_id)
            .filter(|n| !n.is_deleted)
            .ok_or_else(|| Error::not_found(format!("note {}", note_id)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored password hash of a user.
    pub fn password_hash(&self, user_id: i32) -> Option<String> {
        self.read().passwords.get(&user_id).cloned()
    }

    pub fn has_profile(&self, user_id: i32) -> bool {
        self.read().profiles.contains(&user_id)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert_course(
        &self,
        name: &str,
        description: Option<&str>,
        _created_at: NaiveDateTime,
    ) -> Result<Course> {
        let mut state = self.write();
        let course = Course {
            id: state.next_id(),
            name: name.to_owned(),
            description: description.map(str::to_owned),
        };
        state.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn find_course(&self, id: i32) -> Result<Option<Course>> {
        Ok(self.read().courses.get(&id).cloned())
    }

    async fn insert_subject(&self, subject: NewSubject) -> Result<Subject> {
        let mut state = self.write();
        if let Some(course_id) = subject.course_id {
            if !state.courses.contains_key(&course_id) {
                return Err(Error::not_found(format!("course {}", course_id)));
            }
        }
        let subject = Subject {
            id: state.next_id(),
            name: subject.name,
            course_id: subject.course_id,
            is_major: subject.is_major,
        };
        state.subjects.insert(subject.id, subject.clone());
        Ok(subject)
    }

    async fn find_subject(&self, id: i32) -> Result<Option<Subject>> {
        Ok(self.read().subjects.get(&id).cloned())
    }

    async fn subjects_for(&self, course_id: Option<i32>) -> Result<Vec<Subject>> {
        let mut subjects: Vec<Subject> = self
            .read()
            .subjects
            .values()
            .filter(|s| s.is_general() || (course_id.is_some() && s.course_id == course_id))
            .cloned()
            .collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(subjects)
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut state = self.write();
        if state.users.values().any(|u| u.school_id == new.school_id) {
            return Err(Error::validation("School ID is already registered"));
        }
        let email = new.email.trim().to_lowercase();
        if state.users.values().any(|u| u.email == email) {
            return Err(Error::validation("Email is already registered"));
        }

        let user = User {
            id: state.next_id(),
            school_id: new.school_id,
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            course_id: new.course_id,
            is_active: true,
            created_at: new.created_at,
        };
        state.passwords.insert(user.id, new.password_hash);
        state.profiles.insert(user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.read().users.len() as u64)
    }

    async fn any_admin(&self) -> Result<bool> {
        Ok(self.read().users.values().any(|u| u.role == Role::Admin))
    }

    async fn update_role(&self, user_id: i32, decide: &RoleChangeFn<'_>) -> Result<User> {
        let mut state = self.write();
        let admins = state.active_admins();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| Error::not_found(format!("user {}", user_id)))?;
        let assignment = decide(user, admins)?;
        assignment.apply(user);
        Ok(user.clone())
    }

    async fn set_active(
        &self,
        user_id: i32,
        active: bool,
        decide: &ActivationFn<'_>,
    ) -> Result<User> {
        let mut state = self.write();
        let admins = state.active_admins();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| Error::not_found(format!("user {}", user_id)))?;
        decide(user, admins)?;
        user.is_active = active;
        Ok(user.clone())
    }

    async fn insert_note(&self, new: NewNote) -> Result<Note> {
        let mut state = self.write();
        let subject = state
            .subjects
            .get(&new.subject_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("subject {}", new.subject_id)))?;
        if !state.users.contains_key(&new.uploader_id) {
            return Err(Error::not_found(format!("user {}", new.uploader_id)));
        }

        let note = Note {
            id: state.next_id(),
            title: new.title,
            description: new.description,
            content: new.content,
            file: new.file,
            uploader_id: new.uploader_id,
            subject,
            visibility: new.visibility,
            status: Default::default(),
            rejection_reason: None,
            is_deleted: false,
            uploaded_at: new.uploaded_at,
            updated_at: new.uploaded_at,
        };
        state.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn find_note(&self, id: i32) -> Result<Option<Note>> {
        Ok(self.read().notes.get(&id).cloned())
    }

    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .read()
            .notes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        notes.sort_by(listing_order);
        Ok(notes)
    }

    async fn count_notes(&self, filter: &NoteFilter) -> Result<u64> {
        Ok(self
            .read()
            .notes
            .values()
            .filter(|n| filter.matches(n))
            .count() as u64)
    }

    async fn transition(&self, note_id: i32, decide: &TransitionFn<'_>) -> Result<Note> {
        let mut state = self.write();
        let current = state
            .notes
            .get(&note_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("note {}", note_id)))?;

        let transition = decide(&current)?;

        if let Some(action) = transition.action {
            let id = state.next_id();
            state.actions.push(NoteAction {
                id,
                note_id,
                action: action.action,
                actor_id: Some(action.actor_id),
                reason: action.reason,
                created_at: action.created_at,
            });
        }
        state.notes.insert(note_id, transition.note.clone());
        Ok(transition.note)
    }

    async fn note_actions(&self, note_id: i32) -> Result<Vec<NoteAction>> {
        let mut actions: Vec<NoteAction> = self
            .read()
            .actions
            .iter()
            .filter(|a| a.note_id == note_id)
            .cloned()
            .collect();
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(actions)
    }

    async fn toggle_like(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool> {
        let mut state = self.write();
        state.live_note(note_id)?;
        if state.likes.remove(&(note_id, user_id)).is_some() {
            Ok(false)
        } else {
            state.likes.insert((note_id, user_id), now);
            Ok(true)
        }
    }

    async fn count_likes(&self, note_id: i32) -> Result<u64> {
        Ok(self
            .read()
            .likes
            .keys()
            .filter(|(n, _)| *n == note_id)
            .count() as u64)
    }

    async fn toggle_save(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool> {
        let mut state = self.write();
        state.live_note(note_id)?;
        if state.saves.remove(&(note_id, user_id)).is_some() {
            Ok(false)
        } else {
            state.saves.insert((note_id, user_id), now);
            Ok(true)
        }
    }

    async fn saved_notes(&self, user_id: i32) -> Result<Vec<Note>> {
        let state = self.read();
        let mut notes: Vec<Note> = state
            .saves
            .keys()
            .filter(|(_, u)| *u == user_id)
            .filter_map(|(n, _)| state.notes.get(n))
            .filter(|n| !n.is_deleted && n.is_approved())
            .cloned()
            .collect();
        notes.sort_by(listing_order);
        Ok(notes)
    }

    async fn upsert_rating(
        &self,
        note_id: i32,
        user_id: i32,
        value: i32,
        _now: NaiveDateTime,
    ) -> Result<()> {
        let mut state = self.write();
        state.live_note(note_id)?;
        state.ratings.insert((note_id, user_id), value);
        Ok(())
    }

    async fn ratings(&self, note_id: i32) -> Result<Vec<(i32, i32)>> {
        Ok(self
            .read()
            .ratings
            .iter()
            .filter(|((n, _), _)| *n == note_id)
            .map(|((_, u), v)| (*u, *v))
            .collect())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let mut state = self.write();
        state.live_note(new.note_id)?;
        let comment = Comment {
            id: state.next_id(),
            note_id: new.note_id,
            user_id: new.user_id,
            parent_id: new.parent_id,
            content: new.content,
            created_at: new.created_at,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: i32) -> Result<Option<Comment>> {
        Ok(self.read().comments.get(&id).cloned())
    }

    async fn comments(&self, note_id: i32) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .read()
            .comments
            .values()
            .filter(|c| c.note_id == note_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }
}
