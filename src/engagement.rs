//! Likes, saves, ratings and comments on notes.

use crate::error::{Error, Result};
use crate::orm::note_comments;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comment {
    pub id: i32,
    pub note_id: i32,
    pub user_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl From<note_comments::Model> for Comment {
    fn from(m: note_comments::Model) -> Self {
        Self {
            id: m.id,
            note_id: m.note_id,
            user_id: m.user_id,
            parent_id: m.parent_id,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewComment {
    pub note_id: i32,
    pub user_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// A comment with its replies, oldest first at every level.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Arranges a flat, chronologically sorted comment list into threads.
///
/// Replies whose parent is missing from `comments` are dropped.
pub fn comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut children: HashMap<Option<i32>, Vec<Comment>> = HashMap::new();
    for c in comments {
        children.entry(c.parent_id).or_default().push(c);
    }

    fn attach(parent: Option<i32>, children: &mut HashMap<Option<i32>, Vec<Comment>>) -> Vec<CommentNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

pub fn check_comment(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::validation("Comment cannot be empty"));
    }
    Ok(())
}

pub fn check_rating(value: i32) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StarCount {
    pub stars: i32,
    pub count: u64,
    pub percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Rounded to one decimal place, 0.0 when there are no ratings
    pub average: f64,
    pub total: u64,
    /// Five stars first.
    pub breakdown: Vec<StarCount>,
    /// The viewer's own rating, if any.
    pub own: Option<i32>,
}

impl RatingSummary {
    pub fn from_values(values: &[i32], own: Option<i32>) -> Self {
        let total = values.len() as u64;
        let average = if total == 0 {
            0.0
        } else {
            let sum: i64 = values.iter().map(|v| *v as i64).sum();
            round_to_tenth(sum as f64 / total as f64)
        };

        let breakdown = (MIN_RATING..=MAX_RATING)
            .rev()
            .map(|stars| {
                let count = values.iter().filter(|v| **v == stars).count() as u64;
                let percent = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                };
                StarCount {
                    stars,
                    count,
                    percent,
                }
            })
            .collect();

        Self {
            average,
            total,
            breakdown,
            own,
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
