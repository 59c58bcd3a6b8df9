use super::NoteService;
use crate::engagement::{
    check_comment, check_rating, comment_tree, Comment, CommentNode, NewComment, RatingSummary,
};
use crate::error::{Error, Result};
use crate::note::Note;
use crate::permission::can_view;
use crate::user::User;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
}

impl NoteService {
    /// Signed-in counterpart of `get_note` for write actions.
    async fn engageable_note(&self, user: &User, note_id: i32) -> Result<Note> {
        if !user.is_active {
            return Err(Error::denied("Account is inactive"));
        }
        self.get_note(Some(user), note_id).await
    }

    pub async fn toggle_like(&self, user: &User, note_id: i32) -> Result<LikeState> {
        self.engageable_note(user, note_id).await?;
        let now = Utc::now().naive_utc();
        let liked = self.store.toggle_like(note_id, user.id, now).await?;
        let count = self.store.count_likes(note_id).await?;
        Ok(LikeState { liked, count })
    }

    /// Returns whether the note is bookmarked after the toggle.
    pub async fn toggle_save(&self, user: &User, note_id: i32) -> Result<bool> {
        self.engageable_note(user, note_id).await?;
        let now = Utc::now().naive_utc();
        self.store.toggle_save(note_id, user.id, now).await
    }

    /// Bookmarked notes the user can still see.
    pub async fn saved_notes(&self, user: &User) -> Result<Vec<Note>> {
        if !user.is_active {
            return Err(Error::denied("Account is inactive"));
        }
        Ok(self
            .store
            .saved_notes(user.id)
            .await?
            .into_iter()
            .filter(|n| can_view(Some(user), n))
            .collect())
    }

    /// Rates a note 1 to 5, replacing any earlier rating by the same user.
    pub async fn rate(&self, user: &User, note_id: i32, value: i32) -> Result<RatingSummary> {
        check_rating(value)?;
        let note = self.engageable_note(user, note_id).await?;
        if note.is_owned_by(user) {
            return Err(Error::denied("You cannot rate your own note"));
        }

        let now = Utc::now().naive_utc();
        self.store.upsert_rating(note_id, user.id, value, now).await?;
        self.summary(note_id, Some(user)).await
    }

    pub async fn rating_summary(
        &self,
        viewer: Option<&User>,
        note_id: i32,
    ) -> Result<RatingSummary> {
        self.get_note(viewer, note_id).await?;
        self.summary(note_id, viewer).await
    }

    async fn summary(&self, note_id: i32, viewer: Option<&User>) -> Result<RatingSummary> {
        let ratings = self.store.ratings(note_id).await?;
        let own = viewer.and_then(|v| {
            ratings
                .iter()
                .find(|(user_id, _)| *user_id == v.id)
                .map(|(_, value)| *value)
        });
        let values: Vec<i32> = ratings.into_iter().map(|(_, value)| value).collect();
        Ok(RatingSummary::from_values(&values, own))
    }

    /// Adds a comment, or a reply when `parent_id` names a comment on the
    /// same note.
    pub async fn add_comment(
        &self,
        user: &User,
        note_id: i32,
        content: &str,
        parent_id: Option<i32>,
    ) -> Result<Comment> {
        check_comment(content)?;
        self.engageable_note(user, note_id).await?;

        if let Some(parent_id) = parent_id {
            let parent = self.store.find_comment(parent_id).await?;
            match parent {
                Some(parent) if parent.note_id == note_id => {}
                _ => return Err(Error::validation("Invalid parent comment")),
            }
        }

        let comment = self
            .store
            .insert_comment(NewComment {
                note_id,
                user_id: user.id,
                parent_id,
                content: content.trim().to_owned(),
                created_at: Utc::now().naive_utc(),
            })
            .await?;

        log::debug!("User {} commented on note {}", user.id, note_id);
        Ok(comment)
    }

    /// Comment threads of a note. Comments follow the note's view gate.
    pub async fn comments(&self, viewer: Option<&User>, note_id: i32) -> Result<Vec<CommentNode>> {
        self.get_note(viewer, note_id).await?;
        Ok(comment_tree(self.store.comments(note_id).await?))
    }
}
