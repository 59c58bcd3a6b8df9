//! Test fixtures for creating test data
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use pamana::note::{Course, NewNote, Note, NoteForm, Subject, Visibility};
use pamana::notifications::{Notifier, NotifyError, NotifyResult};
use pamana::store::{NewSubject, NoteStore};
use pamana::user::{NewUser, User};
use pamana::{NoteService, Role};
use std::sync::{Arc, Mutex};

pub async fn create_course(store: &dyn NoteStore, name: &str) -> Course {
    store
        .insert_course(name, None, Utc::now().naive_utc())
        .await
        .expect("Failed to create course")
}

pub async fn create_subject(
    store: &dyn NoteStore,
    name: &str,
    course_id: Option<i32>,
    is_major: bool,
) -> Subject {
    store
        .insert_subject(NewSubject {
            name: name.to_string(),
            course_id,
            is_major,
        })
        .await
        .expect("Failed to create subject")
}

/// Inserts a user directly, skipping registration and password hashing.
pub async fn create_user(
    store: &dyn NoteStore,
    school_id: &str,
    role: Role,
    course_id: Option<i32>,
) -> User {
    store
        .insert_user(NewUser {
            school_id: school_id.to_string(),
            email: format!("{}@test.edu", school_id.to_lowercase()),
            first_name: "Test".to_string(),
            last_name: school_id.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            role,
            course_id,
            created_at: Utc::now().naive_utc(),
        })
        .await
        .expect("Failed to create user")
}

/// Inserts a pending note uploaded `age_minutes` ago.
pub async fn create_note(
    store: &dyn NoteStore,
    uploader: &User,
    subject: &Subject,
    visibility: Visibility,
    title: &str,
    age_minutes: i64,
) -> Note {
    store
        .insert_note(NewNote {
            title: title.to_string(),
            description: format!("{} description", title),
            content: None,
            file: None,
            uploader_id: uploader.id,
            subject_id: subject.id,
            visibility,
            uploaded_at: minutes_ago(age_minutes),
        })
        .await
        .expect("Failed to create note")
}

pub fn minutes_ago(minutes: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::minutes(minutes)
}

pub fn note_form(title: &str, subject_id: i32, visibility: Option<Visibility>) -> NoteForm {
    NoteForm {
        title: title.to_string(),
        description: "Lecture notes".to_string(),
        content: None,
        file: Some("notes.pdf".to_string()),
        subject_id,
        visibility,
    }
}

/// Records every notification; optionally fails each send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(&'static str, i32)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(&'static str, i32)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, kind: &'static str, note: &Note) -> NotifyResult<()> {
        self.sent.lock().unwrap().push((kind, note.id));
        if self.fail {
            Err(NotifyError::Send("smtp server unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_approved(&self, note: &Note, _uploader: &User) -> NotifyResult<()> {
        self.record("approved", note)
    }

    async fn notify_rejected(&self, note: &Note, _uploader: &User) -> NotifyResult<()> {
        self.record("rejected", note)
    }
}

/// Two courses and the people and subjects around them.
///
/// - `x`, `y`: courses
/// - `math_x`: subject of course X, `history_y`: subject of course Y
/// - `ethics`: general subject, `thesis_x`: major subject of course X
/// - `admin`; `mod_x`: moderator of X; `student_a` in X; `student_b` in Y
pub struct World {
    pub service: Arc<NoteService>,
    pub store: Arc<dyn NoteStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub x: Course,
    pub y: Course,
    pub math_x: Subject,
    pub history_y: Subject,
    pub ethics: Subject,
    pub thesis_x: Subject,
    pub admin: User,
    pub mod_x: User,
    pub student_a: User,
    pub student_b: User,
}

impl World {
    pub async fn new(store: Arc<dyn NoteStore>) -> Self {
        Self::with_notifier(store, Arc::new(RecordingNotifier::default())).await
    }

    pub async fn with_notifier(store: Arc<dyn NoteStore>, notifier: Arc<RecordingNotifier>) -> Self {
        let s = store.as_ref();
        let x = create_course(s, "BS Computer Science").await;
        let y = create_course(s, "BS Nursing").await;
        let math_x = create_subject(s, "Discrete Math", Some(x.id), false).await;
        let history_y = create_subject(s, "Nursing History", Some(y.id), false).await;
        let ethics = create_subject(s, "Ethics", None, false).await;
        let thesis_x = create_subject(s, "Thesis", Some(x.id), true).await;
        let admin = create_user(s, "0000-0001-H", Role::Admin, None).await;
        let mod_x = create_user(s, "0000-0002-H", Role::Moderator, Some(x.id)).await;
        let student_a = create_user(s, "2024-0001-H", Role::Student, Some(x.id)).await;
        let student_b = create_user(s, "2024-0002-H", Role::Student, Some(y.id)).await;

        let service = Arc::new(
            NoteService::new(store.clone()).with_notifier(notifier.clone() as Arc<dyn Notifier>),
        );

        Self {
            service,
            store,
            notifier,
            x,
            y,
            math_x,
            history_y,
            ethics,
            thesis_x,
            admin,
            mod_x,
            student_a,
            student_b,
        }
    }

    /// A note by `student_a` under `math_x`, approved by the admin.
    pub async fn approved_note(&self, visibility: Visibility, title: &str) -> Note {
        let note = create_note(
            self.store.as_ref(),
            &self.student_a,
            &self.math_x,
            visibility,
            title,
            0,
        )
        .await;
        self.service
            .approve(&self.admin, note.id)
            .await
            .expect("Failed to approve note")
    }
}
