pub mod courses;
pub mod note_actions;
pub mod note_comments;
pub mod note_likes;
pub mod note_ratings;
pub mod note_saves;
pub mod notes;
pub mod profiles;
pub mod subjects;
pub mod users;
