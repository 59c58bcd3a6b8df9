//! Note moderation state machine.
//!
//! `plan` is pure: given the current note, the actor and an event it returns
//! the updated note plus the audit entry to append. Stores apply the pair
//! inside one write scope so status and history never disagree.

use crate::error::{Error, Result};
use crate::note::{
    resolve_visibility, ContentRules, ModerationStatus, NewNoteAction, Note, NoteActionKind,
    NoteEdit,
};
use crate::permission::{can_delete, can_edit, can_moderate};
use crate::user::User;
use chrono::NaiveDateTime;

#[derive(Clone, Debug, PartialEq)]
pub enum ModerationEvent {
    Approve,
    Reject { reason: String },
    Edit(NoteEdit),
    SoftDelete,
}

impl ModerationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ModerationEvent::Approve => "approve",
            ModerationEvent::Reject { .. } => "reject",
            ModerationEvent::Edit(_) => "edit",
            ModerationEvent::SoftDelete => "soft_delete",
        }
    }
}

/// Result of a legal transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub note: Note,
    /// `None` for soft deletes, which leave no audit row.
    pub action: Option<NewNoteAction>,
}

pub fn plan(
    note: &Note,
    actor: &User,
    event: &ModerationEvent,
    rules: &ContentRules,
    now: NaiveDateTime,
) -> Result<Transition> {
    if let ModerationEvent::Reject { reason } = event {
        if reason.trim().is_empty() {
            return Err(Error::validation("A rejection reason is required"));
        }
    }

    if note.is_deleted {
        return Err(Error::not_found(format!("note {}", note.id)));
    }

    let mut next = note.clone();
    let action = match event {
        ModerationEvent::Approve => {
            if !can_moderate(actor, note) {
                return Err(Error::denied("You cannot moderate this note"));
            }
            if note.status == ModerationStatus::Approved {
                return Err(Error::InvalidTransition(format!(
                    "note {} is already approved",
                    note.id
                )));
            }
            next.status = ModerationStatus::Approved;
            next.rejection_reason = None;
            Some(entry(NoteActionKind::Approved, actor, None, now))
        }
        ModerationEvent::Reject { reason } => {
            if !can_moderate(actor, note) {
                return Err(Error::denied("You cannot moderate this note"));
            }
            if note.status == ModerationStatus::Rejected {
                return Err(Error::InvalidTransition(format!(
                    "note {} is already rejected",
                    note.id
                )));
            }
            let reason = reason.trim().to_owned();
            next.status = ModerationStatus::Rejected;
            next.rejection_reason = Some(reason.clone());
            Some(entry(NoteActionKind::Rejected, actor, Some(reason), now))
        }
        ModerationEvent::Edit(edit) => {
            if !can_edit(actor, note) {
                return Err(Error::denied("Only the uploader can edit this note"));
            }
            apply_edit(&mut next, actor, edit, rules)?;
            next.status = ModerationStatus::Pending;
            next.rejection_reason = None;
            Some(entry(NoteActionKind::Resubmitted, actor, None, now))
        }
        ModerationEvent::SoftDelete => {
            if !can_delete(actor, note) {
                return Err(Error::denied("You cannot delete this note"));
            }
            next.is_deleted = true;
            None
        }
    };

    next.updated_at = now;
    Ok(Transition { note: next, action })
}

fn entry(
    action: NoteActionKind,
    actor: &User,
    reason: Option<String>,
    now: NaiveDateTime,
) -> NewNoteAction {
    NewNoteAction {
        action,
        actor_id: actor.id,
        reason,
        created_at: now,
    }
}

fn apply_edit(note: &mut Note, owner: &User, edit: &NoteEdit, rules: &ContentRules) -> Result<()> {
    if let Some(title) = &edit.title {
        rules.check_title(title)?;
        note.title = title.trim().to_owned();
    }
    if let Some(description) = &edit.description {
        rules.check_description(description)?;
        note.description = description.trim().to_owned();
    }
    if let Some(content) = &edit.content {
        note.content = Some(content.to_owned()).filter(|c| !c.trim().is_empty());
    }
    if let Some(file) = &edit.file {
        rules.check_file(file)?;
        note.file = Some(file.to_owned());
    }
    if let Some(visibility) = edit.visibility {
        note.visibility = resolve_visibility(owner, &note.subject, visibility)?;
    }
    Ok(())
}
