//! The note core's entry points.
//!
//! `NoteService` owns a store and a notifier and exposes the operations an
//! HTTP layer calls: evaluation, transitions, listings, accounts,
//! engagement and dashboards. Every operation re-checks authority itself.

mod accounts;
mod dashboard;
mod engagement;

pub use dashboard::{AdminStats, UserStats};
pub use engagement::LikeState;

use crate::app_config::AppConfig;
use crate::error::{Error, Result};
use crate::filter::{self, ListScope};
use crate::moderation::{self, ModerationEvent};
use crate::note::{
    check_subject_access, resolve_visibility, ContentRules, NewNote, Note, NoteAction, NoteEdit,
    NoteForm, SubjectChoice,
};
use crate::notifications::{LogNotifier, Notifier};
use crate::permission;
use crate::store::NoteStore;
use crate::user::User;
use chrono::Utc;
use std::sync::Arc;

/// Per-note result of a bulk reject.
#[derive(Debug, Default)]
pub struct BulkRejectOutcome {
    pub rejected: Vec<i32>,
    pub failed: Vec<(i32, Error)>,
}

pub struct NoteService {
    store: Arc<dyn NoteStore>,
    notifier: Arc<dyn Notifier>,
    rules: ContentRules,
    default_rejection_reason: String,
    min_password_length: usize,
}

impl NoteService {
    /// Service with default rules that logs notifications.
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        let config = AppConfig::default();
        Self {
            store,
            notifier: Arc::new(LogNotifier::default()),
            rules: config.moderation.content_rules(),
            default_rejection_reason: config.moderation.default_rejection_reason,
            min_password_length: config.accounts.min_password_length,
        }
    }

    pub fn from_config(store: Arc<dyn NoteStore>, config: &AppConfig) -> Self {
        Self {
            store,
            notifier: crate::notifications::from_config(&config.notifications),
            rules: config.moderation.content_rules(),
            default_rejection_reason: config.moderation.default_rejection_reason.clone(),
            min_password_length: config.accounts.min_password_length,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_rules(mut self, rules: ContentRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn store(&self) -> &dyn NoteStore {
        self.store.as_ref()
    }

    pub fn evaluate_view(&self, user: Option<&User>, note: &Note) -> bool {
        permission::can_view(user, note)
    }

    pub fn evaluate_edit(&self, user: &User, note: &Note) -> bool {
        permission::can_edit(user, note)
    }

    pub fn evaluate_moderate(&self, user: &User, note: &Note) -> bool {
        permission::can_moderate(user, note)
    }

    /// Loads a live note the viewer may see.
    pub async fn get_note(&self, viewer: Option<&User>, note_id: i32) -> Result<Note> {
        let note = self
            .store
            .find_note(note_id)
            .await?
            .filter(|n| !n.is_deleted)
            .ok_or_else(|| Error::not_found(format!("note {}", note_id)))?;

        if !permission::can_view(viewer, &note) {
            return Err(Error::denied("You cannot view this note"));
        }
        Ok(note)
    }

    /// Subjects `user` may upload under: general ones plus those of the
    /// user's own course, by name.
    pub async fn available_subjects(&self, user: &User) -> Result<Vec<SubjectChoice>> {
        if !user.is_active {
            return Err(Error::denied("Account is inactive"));
        }

        Ok(self
            .store
            .subjects_for(user.course_id)
            .await?
            .iter()
            .filter(|s| check_subject_access(user, s).is_ok())
            .map(SubjectChoice::from)
            .collect())
    }

    /// Creates a pending note.
    pub async fn upload_note(&self, uploader: &User, form: NoteForm) -> Result<Note> {
        if !uploader.is_active {
            return Err(Error::denied("Account is inactive"));
        }

        self.rules.check_title(&form.title)?;
        self.rules.check_description(&form.description)?;
        if let Some(file) = &form.file {
            self.rules.check_file(file)?;
        }

        let subject = self
            .store
            .find_subject(form.subject_id)
            .await?
            .ok_or_else(|| Error::validation("Selected subject does not exist"))?;
        check_subject_access(uploader, &subject)?;
        let visibility =
            resolve_visibility(uploader, &subject, form.visibility.unwrap_or_default())?;

        let note = self
            .store
            .insert_note(NewNote {
                title: form.title.trim().to_owned(),
                description: form.description.trim().to_owned(),
                content: form.content.filter(|c| !c.trim().is_empty()),
                file: form.file,
                uploader_id: uploader.id,
                subject_id: subject.id,
                visibility,
                uploaded_at: Utc::now().naive_utc(),
            })
            .await?;

        log::info!(
            "User {} uploaded note {} under subject {}",
            uploader.id,
            note.id,
            subject.id
        );
        Ok(note)
    }

    /// Applies `event` to a note as `actor`.
    ///
    /// The decision and the write happen in one store transaction. Approvals
    /// and rejections notify the uploader afterwards; a failed notification
    /// is logged and does not undo the transition.
    pub async fn transition(
        &self,
        note_id: i32,
        event: ModerationEvent,
        actor: &User,
    ) -> Result<Note> {
        let now = Utc::now().naive_utc();
        let rules = &self.rules;
        let decide = |current: &Note| moderation::plan(current, actor, &event, rules, now);

        let note = match self.store.transition(note_id, &decide).await {
            Ok(note) => note,
            Err(e) => {
                log::debug!(
                    "Transition {} on note {} by user {} refused ({}): {}",
                    event.name(),
                    note_id,
                    actor.id,
                    e.kind(),
                    e
                );
                return Err(e);
            }
        };

        log::info!(
            "Note {} {} by user {}, status now {:?}",
            note.id,
            event.name(),
            actor.id,
            note.status
        );

        match event {
            ModerationEvent::Approve | ModerationEvent::Reject { .. } => self.notify(&note).await,
            ModerationEvent::Edit(_) | ModerationEvent::SoftDelete => {}
        }

        Ok(note)
    }

    pub async fn approve(&self, actor: &User, note_id: i32) -> Result<Note> {
        self.transition(note_id, ModerationEvent::Approve, actor).await
    }

    pub async fn reject(&self, actor: &User, note_id: i32, reason: &str) -> Result<Note> {
        let event = ModerationEvent::Reject {
            reason: reason.to_owned(),
        };
        self.transition(note_id, event, actor).await
    }

    pub async fn edit(&self, actor: &User, note_id: i32, edit: NoteEdit) -> Result<Note> {
        self.transition(note_id, ModerationEvent::Edit(edit), actor).await
    }

    pub async fn soft_delete(&self, actor: &User, note_id: i32) -> Result<Note> {
        self.transition(note_id, ModerationEvent::SoftDelete, actor).await
    }

    /// Rejects each note on its own. One note failing leaves the others as
    /// they end up; a blank reason falls back to the configured default.
    pub async fn bulk_reject(
        &self,
        actor: &User,
        note_ids: &[i32],
        reason: Option<&str>,
    ) -> Result<BulkRejectOutcome> {
        if !actor.is_active || actor.is_student() {
            return Err(Error::denied("Only moderators and admins can reject notes"));
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.default_rejection_reason.as_str())
            .to_owned();

        let mut outcome = BulkRejectOutcome::default();
        for &note_id in note_ids {
            match self.reject(actor, note_id, &reason).await {
                Ok(_) => outcome.rejected.push(note_id),
                Err(e) => outcome.failed.push((note_id, e)),
            }
        }

        log::info!(
            "Bulk reject by user {}: {} rejected, {} failed",
            actor.id,
            outcome.rejected.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    pub async fn list_notes(&self, user: Option<&User>, scope: ListScope) -> Result<Vec<Note>> {
        let filter = filter::build(user, scope)?;
        self.store.list_notes(&filter).await
    }

    /// Moderation timeline of a note, oldest first. Open to the uploader
    /// and anyone who may moderate the note.
    pub async fn note_history(&self, actor: &User, note_id: i32) -> Result<Vec<NoteAction>> {
        let note = self
            .store
            .find_note(note_id)
            .await?
            .filter(|n| !n.is_deleted)
            .ok_or_else(|| Error::not_found(format!("note {}", note_id)))?;

        let owner = actor.is_active && note.is_owned_by(actor);
        if !owner && !permission::can_moderate(actor, &note) {
            return Err(Error::denied("You cannot see this note's history"));
        }
        self.store.note_actions(note_id).await
    }

    async fn notify(&self, note: &Note) {
        let uploader = match self.store.find_user(note.uploader_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                log::warn!("Uploader {} of note {} not found", note.uploader_id, note.id);
                return;
            }
            Err(e) => {
                log::warn!("Could not load uploader of note {}: {}", note.id, e);
                return;
            }
        };

        let sent = if note.is_approved() {
            self.notifier.notify_approved(note, &uploader).await
        } else {
            self.notifier.notify_rejected(note, &uploader).await
        };
        if let Err(e) = sent {
            log::warn!("Failed to notify user {} about note {}: {}", uploader.id, note.id, e);
        }
    }
}
