pub mod app_config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod filter;
pub mod moderation;
pub mod note;
pub mod notifications;
pub mod orm;
pub mod permission;
pub mod role;
pub mod service;
pub mod store;
pub mod user;

pub use error::{Error, Result};
pub use filter::ListScope;
pub use moderation::ModerationEvent;
pub use note::{ModerationStatus, Note, Visibility};
pub use role::Role;
pub use service::NoteService;
pub use user::User;
