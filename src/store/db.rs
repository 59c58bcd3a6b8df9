//! SeaORM-backed `NoteStore`.
//!
//! Every write touching more than one row runs in a transaction. Decision
//! callbacks run after the rows they depend on are read with `FOR UPDATE`
//! (ignored by SQLite, where the transaction itself serializes writers).

use super::{ActivationFn, NewSubject, NoteStore, RoleChangeFn, TransitionFn};
use crate::engagement::{Comment, NewComment};
use crate::error::{Error, Result};
use crate::filter::NoteFilter;
use crate::note::{Course, ModerationStatus, NewNote, Note, NoteAction, Subject};
use crate::orm::{
    courses, note_actions, note_comments, note_likes, note_ratings, note_saves, notes, profiles,
    subjects, users,
};
use crate::role::Role;
use crate::user::{NewUser, User};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, SqlErr, TransactionTrait,
};

pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store over the global pool set up by `db::init_db`.
    pub fn from_pool() -> Self {
        Self::new(crate::db::get_db_pool().to_owned())
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// A registration that loses the race to the unique index on `users`.
fn registration_conflict(e: DbErr) -> Error {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            Error::validation("School ID or email is already registered")
        }
        _ => e.into(),
    }
}

fn into_note(row: (notes::Model, Option<subjects::Model>)) -> Result<Note> {
    let (note, subject) = row;
    let subject = subject.ok_or_else(|| Error::not_found(format!("subject {}", note.subject_id)))?;
    Ok(Note::from_models(note, subject))
}

async fn load_note<C: ConnectionTrait>(conn: &C, note: notes::Model) -> Result<Note> {
    let subject = subjects::Entity::find_by_id(note.subject_id).one(conn).await?;
    into_note((note, subject))
}

async fn ensure_live_note(txn: &DatabaseTransaction, note_id: i32) -> Result<()> {
    let found = notes::Entity::find_by_id(note_id)
        .filter(notes::Column::IsDeleted.eq(false))
        .one(txn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(Error::not_found(format!("note {}", note_id))),
    }
}

/// Locks the active admin rows and returns how many there are.
async fn lock_active_admins(txn: &DatabaseTransaction) -> Result<u64> {
    let admins = users::Entity::find()
        .filter(users::Column::Role.eq(Role::Admin.to_value()))
        .filter(users::Column::IsActive.eq(true))
        .lock_exclusive()
        .all(txn)
        .await?;
    Ok(admins.len() as u64)
}

async fn lock_user(txn: &DatabaseTransaction, user_id: i32) -> Result<users::Model> {
    users::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", user_id)))
}

#[async_trait]
impl NoteStore for DbStore {
    async fn insert_course(
        &self,
        name: &str,
        description: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<Course> {
        let course = courses::ActiveModel {
            name: Set(name.to_owned()),
            description: Set(description.map(str::to_owned)),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(course.into())
    }

    async fn find_course(&self, id: i32) -> Result<Option<Course>> {
        Ok(courses::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Course::from))
    }

    async fn insert_subject(&self, subject: NewSubject) -> Result<Subject> {
        if let Some(course_id) = subject.course_id {
            if self.find_course(course_id).await?.is_none() {
                return Err(Error::not_found(format!("course {}", course_id)));
            }
        }
        let subject = subjects::ActiveModel {
            name: Set(subject.name),
            course_id: Set(subject.course_id),
            is_major: Set(subject.is_major),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(subject.into())
    }

    async fn find_subject(&self, id: i32) -> Result<Option<Subject>> {
        Ok(subjects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Subject::from))
    }

    async fn subjects_for(&self, course_id: Option<i32>) -> Result<Vec<Subject>> {
        let mut reach = Condition::any().add(subjects::Column::CourseId.is_null());
        if let Some(course_id) = course_id {
            reach = reach.add(subjects::Column::CourseId.eq(course_id));
        }

        Ok(subjects::Entity::find()
            .filter(reach)
            .order_by_asc(subjects::Column::Name)
            .order_by_asc(subjects::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Subject::from)
            .collect())
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let email = new.email.trim().to_lowercase();
        let txn = self.db.begin().await?;

        let taken = users::Entity::find()
            .filter(users::Column::SchoolId.eq(new.school_id.as_str()))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(Error::validation("School ID is already registered"));
        }
        let taken = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(Error::validation("Email is already registered"));
        }

        let user = users::ActiveModel {
            school_id: Set(new.school_id),
            email: Set(email),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            password: Set(new.password_hash),
            role: Set(new.role),
            course_id: Set(new.course_id),
            is_active: Set(true),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(registration_conflict)?;

        profiles::Entity::insert(profiles::ActiveModel {
            user_id: Set(user.id),
            image: Set(None),
            bio: Set(None),
        })
        .exec_without_returning(&txn)
        .await?;

        txn.commit().await?;
        Ok(user.into())
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>> {
        Ok(users::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(User::from))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(users::Entity::find().count(&self.db).await?)
    }

    async fn any_admin(&self) -> Result<bool> {
        let admins = users::Entity::find()
            .filter(users::Column::Role.eq(Role::Admin.to_value()))
            .count(&self.db)
            .await?;
        Ok(admins > 0)
    }

    async fn update_role(&self, user_id: i32, decide: &RoleChangeFn<'_>) -> Result<User> {
        let txn = self.db.begin().await?;
        let admins = lock_active_admins(&txn).await?;
        let row = lock_user(&txn, user_id).await?;

        let assignment = decide(&User::from(row.clone()), admins)?;

        let mut user: users::ActiveModel = row.into();
        user.role = Set(assignment.role);
        user.course_id = Set(assignment.course_id);
        if assignment.clear_names {
            user.first_name = Set(String::new());
            user.last_name = Set(String::new());
        }
        let user = user.update(&txn).await?;

        txn.commit().await?;
        Ok(user.into())
    }

    async fn set_active(
        &self,
        user_id: i32,
        active: bool,
        decide: &ActivationFn<'_>,
    ) -> Result<User> {
        let txn = self.db.begin().await?;
        let admins = lock_active_admins(&txn).await?;
        let row = lock_user(&txn, user_id).await?;

        decide(&User::from(row.clone()), admins)?;

        let mut user: users::ActiveModel = row.into();
        user.is_active = Set(active);
        let user = user.update(&txn).await?;

        txn.commit().await?;
        Ok(user.into())
    }

    async fn insert_note(&self, new: NewNote) -> Result<Note> {
        let subject = subjects::Entity::find_by_id(new.subject_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("subject {}", new.subject_id)))?;

        let note = notes::ActiveModel {
            title: Set(new.title),
            description: Set(new.description),
            content: Set(new.content),
            file: Set(new.file),
            uploader_id: Set(new.uploader_id),
            subject_id: Set(new.subject_id),
            visibility: Set(new.visibility),
            status: Set(ModerationStatus::Pending),
            rejection_reason: Set(None),
            is_deleted: Set(false),
            uploaded_at: Set(new.uploaded_at),
            updated_at: Set(new.uploaded_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(Note::from_models(note, subject))
    }

    async fn find_note(&self, id: i32) -> Result<Option<Note>> {
        notes::Entity::find_by_id(id)
            .find_also_related(subjects::Entity)
            .one(&self.db)
            .await?
            .map(into_note)
            .transpose()
    }

    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        notes::Entity::find()
            .find_also_related(subjects::Entity)
            .filter(filter.to_condition())
            .order_by_desc(notes::Column::UploadedAt)
            .order_by_asc(notes::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(into_note)
            .collect()
    }

    async fn count_notes(&self, filter: &NoteFilter) -> Result<u64> {
        Ok(notes::Entity::find()
            .join(JoinType::InnerJoin, notes::Relation::Subject.def())
            .filter(filter.to_condition())
            .count(&self.db)
            .await?)
    }

    async fn transition(&self, note_id: i32, decide: &TransitionFn<'_>) -> Result<Note> {
        let txn = self.db.begin().await?;

        let row = notes::Entity::find_by_id(note_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found(format!("note {}", note_id)))?;
        let current = load_note(&txn, row.clone()).await?;

        let transition = decide(&current)?;
        let next = transition.note;

        let mut note: notes::ActiveModel = row.into();
        note.title = Set(next.title.clone());
        note.description = Set(next.description.clone());
        note.content = Set(next.content.clone());
        note.file = Set(next.file.clone());
        note.visibility = Set(next.visibility);
        note.status = Set(next.status);
        note.rejection_reason = Set(next.rejection_reason.clone());
        note.is_deleted = Set(next.is_deleted);
        note.updated_at = Set(next.updated_at);
        note.update(&txn).await?;

        if let Some(action) = transition.action {
            note_actions::ActiveModel {
                note_id: Set(note_id),
                action: Set(action.action),
                actor_id: Set(Some(action.actor_id)),
                reason: Set(action.reason),
                created_at: Set(action.created_at),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(next)
    }

    async fn note_actions(&self, note_id: i32) -> Result<Vec<NoteAction>> {
        Ok(note_actions::Entity::find()
            .filter(note_actions::Column::NoteId.eq(note_id))
            .order_by_asc(note_actions::Column::CreatedAt)
            .order_by_asc(note_actions::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(NoteAction::from)
            .collect())
    }

    async fn toggle_like(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool> {
        let txn = self.db.begin().await?;
        ensure_live_note(&txn, note_id).await?;

        let liked = if note_likes::Entity::find_by_id((note_id, user_id))
            .one(&txn)
            .await?
            .is_some()
        {
            note_likes::Entity::delete_by_id((note_id, user_id))
                .exec(&txn)
                .await?;
            false
        } else {
            note_likes::Entity::insert(note_likes::ActiveModel {
                note_id: Set(note_id),
                user_id: Set(user_id),
                created_at: Set(now),
            })
            .exec_without_returning(&txn)
            .await?;
            true
        };

        txn.commit().await?;
        Ok(liked)
    }

    async fn count_likes(&self, note_id: i32) -> Result<u64> {
        Ok(note_likes::Entity::find()
            .filter(note_likes::Column::NoteId.eq(note_id))
            .count(&self.db)
            .await?)
    }

    async fn toggle_save(&self, note_id: i32, user_id: i32, now: NaiveDateTime) -> Result<bool> {
        let txn = self.db.begin().await?;
        ensure_live_note(&txn, note_id).await?;

        let saved = if note_saves::Entity::find_by_id((note_id, user_id))
            .one(&txn)
            .await?
            .is_some()
        {
            note_saves::Entity::delete_by_id((note_id, user_id))
                .exec(&txn)
                .await?;
            false
        } else {
            note_saves::Entity::insert(note_saves::ActiveModel {
                note_id: Set(note_id),
                user_id: Set(user_id),
                created_at: Set(now),
            })
            .exec_without_returning(&txn)
            .await?;
            true
        };

        txn.commit().await?;
        Ok(saved)
    }

    async fn saved_notes(&self, user_id: i32) -> Result<Vec<Note>> {
        let saved_ids = Query::select()
            .column(note_saves::Column::NoteId)
            .from(note_saves::Entity)
            .and_where(note_saves::Column::UserId.eq(user_id))
            .to_owned();

        notes::Entity::find()
            .find_also_related(subjects::Entity)
            .filter(notes::Column::Id.in_subquery(saved_ids))
            .filter(notes::Column::IsDeleted.eq(false))
            .filter(notes::Column::Status.eq(ModerationStatus::Approved.to_value()))
            .order_by_desc(notes::Column::UploadedAt)
            .order_by_asc(notes::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(into_note)
            .collect()
    }

    async fn upsert_rating(
        &self,
        note_id: i32,
        user_id: i32,
        value: i32,
        now: NaiveDateTime,
    ) -> Result<()> {
        let txn = self.db.begin().await?;
        ensure_live_note(&txn, note_id).await?;

        match note_ratings::Entity::find_by_id((note_id, user_id))
            .one(&txn)
            .await?
        {
            Some(existing) => {
                let mut rating: note_ratings::ActiveModel = existing.into();
                rating.value = Set(value);
                rating.update(&txn).await?;
            }
            None => {
                note_ratings::Entity::insert(note_ratings::ActiveModel {
                    note_id: Set(note_id),
                    user_id: Set(user_id),
                    value: Set(value),
                    created_at: Set(now),
                })
                .exec_without_returning(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn ratings(&self, note_id: i32) -> Result<Vec<(i32, i32)>> {
        Ok(note_ratings::Entity::find()
            .filter(note_ratings::Column::NoteId.eq(note_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| (r.user_id, r.value))
            .collect())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let txn = self.db.begin().await?;
        ensure_live_note(&txn, new.note_id).await?;

        let comment = note_comments::ActiveModel {
            note_id: Set(new.note_id),
            user_id: Set(new.user_id),
            parent_id: Set(new.parent_id),
            content: Set(new.content),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(comment.into())
    }

    async fn find_comment(&self, id: i32) -> Result<Option<Comment>> {
        Ok(note_comments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Comment::from))
    }

    async fn comments(&self, note_id: i32) -> Result<Vec<Comment>> {
        Ok(note_comments::Entity::find()
            .filter(note_comments::Column::NoteId.eq(note_id))
            .order_by_asc(note_comments::Column::CreatedAt)
            .order_by_asc(note_comments::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Comment::from)
            .collect())
    }
}
