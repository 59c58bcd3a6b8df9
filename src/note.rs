//! Note entity and the rules for what a note may contain.

use crate::error::{Error, Result};
use crate::orm::{courses, note_actions, notes, subjects};
use crate::user::User;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use crate::orm::note_actions::NoteActionKind;
pub use crate::orm::notes::{ModerationStatus, Visibility};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Course {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<courses::Model> for Course {
    fn from(m: courses::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
        }
    }
}

/// The parts of a subject that authorization depends on.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Subject {
    pub id: i32,
    pub name: String,
    pub course_id: Option<i32>,
    pub is_major: bool,
}

impl Subject {
    /// A general subject has no course and is open to every course.
    pub fn is_general(&self) -> bool {
        self.course_id.is_none()
    }

    /// Label used in pickers, e.g. "Ethics (General)".
    pub fn display_name(&self) -> String {
        if self.is_general() {
            format!("{} (General)", self.name)
        } else {
            self.name.to_owned()
        }
    }
}

/// A subject as offered in an upload picker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectChoice {
    pub id: i32,
    pub label: String,
    pub is_general: bool,
}

impl From<&Subject> for SubjectChoice {
    fn from(s: &Subject) -> Self {
        Self {
            id: s.id,
            label: s.display_name(),
            is_general: s.is_general(),
        }
    }
}

impl From<subjects::Model> for Subject {
    fn from(m: subjects::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            course_id: m.course_id,
            is_major: m.is_major,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Note {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub file: Option<String>,
    pub uploader_id: i32,
    pub subject: Subject,
    pub visibility: Visibility,
    pub status: ModerationStatus,
    pub rejection_reason: Option<String>,
    pub is_deleted: bool,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Note {
    pub fn from_models(note: notes::Model, subject: subjects::Model) -> Self {
        Self {
            id: note.id,
            title: note.title,
            description: note.description,
            content: note.content,
            file: note.file,
            uploader_id: note.uploader_id,
            subject: subject.into(),
            visibility: note.visibility,
            status: note.status,
            rejection_reason: note.rejection_reason,
            is_deleted: note.is_deleted,
            uploaded_at: note.uploaded_at,
            updated_at: note.updated_at,
        }
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.uploader_id == user.id
    }

    pub fn is_approved(&self) -> bool {
        self.status == ModerationStatus::Approved
    }

    pub fn is_pending(&self) -> bool {
        self.status == ModerationStatus::Pending
    }

    pub fn is_rejected(&self) -> bool {
        self.status == ModerationStatus::Rejected
    }
}

/// Listing order: newest upload first, then ascending id.
pub fn listing_order(a: &Note, b: &Note) -> Ordering {
    b.uploaded_at
        .cmp(&a.uploaded_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// An append-only moderation timeline entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoteAction {
    pub id: i32,
    pub note_id: i32,
    pub action: NoteActionKind,
    pub actor_id: Option<i32>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<note_actions::Model> for NoteAction {
    fn from(m: note_actions::Model) -> Self {
        Self {
            id: m.id,
            note_id: m.note_id,
            action: m.action,
            actor_id: m.actor_id,
            reason: m.reason,
            created_at: m.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewNoteAction {
    pub action: NoteActionKind,
    pub actor_id: i32,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Upload request as received from a form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NoteForm {
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    /// Stored file name; the bytes are handled by the file store.
    pub file: Option<String>,
    pub subject_id: i32,
    pub visibility: Option<Visibility>,
}

/// A note row ready to be inserted.
#[derive(Clone, Debug)]
pub struct NewNote {
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub file: Option<String>,
    pub uploader_id: i32,
    pub subject_id: i32,
    pub visibility: Visibility,
    pub uploaded_at: NaiveDateTime,
}

/// Owner edit. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub file: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Content limits applied on upload and edit.
#[derive(Clone, Debug)]
pub struct ContentRules {
    pub max_title_length: usize,
    pub allowed_file_extensions: Vec<String>,
}

impl Default for ContentRules {
    fn default() -> Self {
        Self {
            max_title_length: 255,
            allowed_file_extensions: vec![".pdf".into(), ".docx".into(), ".pptx".into()],
        }
    }
}

impl ContentRules {
    pub fn check_title(&self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("Title is required"));
        }
        if title.chars().count() > self.max_title_length {
            return Err(Error::validation(format!(
                "Title must be at most {} characters",
                self.max_title_length
            )));
        }
        Ok(())
    }

    pub fn check_description(&self, description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(Error::validation("Description is required"));
        }
        Ok(())
    }

    pub fn check_file(&self, file: &str) -> Result<()> {
        let ext = std::path::Path::new(file)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        if self.allowed_file_extensions.iter().any(|a| *a == ext) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Unsupported file extension. Allowed: {}",
                self.allowed_file_extensions.join(", ")
            )))
        }
    }
}

/// Decides the visibility a note gets under `subject` when uploaded by `uploader`.
///
/// Major subjects force course visibility. Course visibility is only legal
/// under a course subject that matches the uploader's own course.
pub fn resolve_visibility(
    uploader: &User,
    subject: &Subject,
    requested: Visibility,
) -> Result<Visibility> {
    let visibility = if subject.is_major {
        Visibility::Course
    } else {
        requested
    };

    if visibility == Visibility::Course {
        let Some(subject_course) = subject.course_id else {
            return Err(Error::validation(
                "Course visibility requires a subject that belongs to a course",
            ));
        };
        if uploader.course_id != Some(subject_course) {
            return Err(Error::denied(
                "Course visibility is limited to the uploader's own course",
            ));
        }
    }

    Ok(visibility)
}

/// Whether `uploader` may file a note under `subject`.
pub fn check_subject_access(uploader: &User, subject: &Subject) -> Result<()> {
    if uploader.is_admin() || subject.is_general() || subject.course_id == uploader.course_id {
        Ok(())
    } else {
        Err(Error::denied("Subject belongs to another course"))
    }
}
