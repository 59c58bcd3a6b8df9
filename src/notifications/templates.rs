/// Message texts for moderation outcomes.
use crate::note::Note;
use crate::user::User;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

pub fn approved(note: &Note, uploader: &User, site_name: &str) -> Message {
    Message {
        subject: "Your note has been approved".to_string(),
        body: format!(
            r#"Hi {},

Your note '{}' has been approved and is now visible.

---
{}
"#,
            uploader.display_name(),
            note.title,
            site_name
        ),
    }
}

pub fn rejected(note: &Note, uploader: &User, site_name: &str) -> Message {
    Message {
        subject: "Your note was rejected".to_string(),
        body: format!(
            r#"Hi {},

Your note '{}' was rejected.

Reason:
{}

---
{}
"#,
            uploader.display_name(),
            note.title,
            note.rejection_reason.as_deref().unwrap_or_default(),
            site_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{ModerationStatus, Subject, Visibility};
    use crate::role::Role;
    use chrono::Utc;

    fn fixtures() -> (Note, User) {
        let now = Utc::now().naive_utc();
        let user = User {
            id: 7,
            school_id: "2023-0042-H".to_string(),
            email: "s@example.com".to_string(),
            first_name: "Maria".to_string(),
            last_name: "Santos".to_string(),
            role: Role::Student,
            course_id: Some(1),
            is_active: true,
            created_at: now,
        };
        let note = Note {
            id: 1,
            title: "Organic Chemistry".to_string(),
            description: "Reactions".to_string(),
            content: None,
            file: None,
            uploader_id: 7,
            subject: Subject {
                id: 1,
                name: "Chemistry".to_string(),
                course_id: Some(1),
                is_major: false,
            },
            visibility: Visibility::Public,
            status: ModerationStatus::Rejected,
            rejection_reason: Some("Pages are missing".to_string()),
            is_deleted: false,
            uploaded_at: now,
            updated_at: now,
        };
        (note, user)
    }

    #[test]
    fn test_approved_message() {
        let (note, user) = fixtures();
        let msg = approved(&note, &user, "Pamana Notes");
        assert_eq!(msg.subject, "Your note has been approved");
        assert!(msg
            .body
            .starts_with("Hi Maria Santos,\n\nYour note 'Organic Chemistry' has been approved"));
    }

    #[test]
    fn test_greeting_falls_back_to_school_id() {
        let (note, mut user) = fixtures();
        user.first_name.clear();
        user.last_name.clear();
        let msg = rejected(&note, &user, "Pamana Notes");
        assert!(msg.body.starts_with("Hi 2023-0042-H,\n"));
    }

    #[test]
    fn test_rejected_message_carries_reason() {
        let (note, user) = fixtures();
        let msg = rejected(&note, &user, "Pamana Notes");
        assert_eq!(msg.subject, "Your note was rejected");
        assert!(msg.body.contains("was rejected.\n\nReason:\nPages are missing"));
        assert!(msg.body.ends_with("Pamana Notes\n"));
    }
}
