use super::NoteService;
use crate::error::{Error, Result};
use crate::filter::NoteFilter;
use crate::note::ModerationStatus;
use crate::user::User;
use serde::Serialize;

/// Site-wide counts. Deleted notes are not counted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_notes: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

/// Counts of a user's own live notes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl NoteService {
    pub async fn admin_stats(&self, actor: &User) -> Result<AdminStats> {
        if !actor.is_active || !actor.is_admin() {
            return Err(Error::denied("Only admins can see site statistics"));
        }

        let all = NoteFilter::all();
        Ok(AdminStats {
            total_users: self.store.count_users().await?,
            total_notes: self.store.count_notes(&all).await?,
            pending: self.count_status(&all, ModerationStatus::Pending).await?,
            approved: self.count_status(&all, ModerationStatus::Approved).await?,
            rejected: self.count_status(&all, ModerationStatus::Rejected).await?,
        })
    }

    pub async fn user_stats(&self, user: &User) -> Result<UserStats> {
        let own = NoteFilter::all().with_uploader(user.id);
        Ok(UserStats {
            total: self.store.count_notes(&own).await?,
            pending: self.count_status(&own, ModerationStatus::Pending).await?,
            approved: self.count_status(&own, ModerationStatus::Approved).await?,
            rejected: self.count_status(&own, ModerationStatus::Rejected).await?,
        })
    }

    async fn count_status(&self, base: &NoteFilter, status: ModerationStatus) -> Result<u64> {
        let filter = base.clone().with_statuses(&[status]);
        self.store.count_notes(&filter).await
    }
}
