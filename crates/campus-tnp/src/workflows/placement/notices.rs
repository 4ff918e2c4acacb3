use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{Actor, Authorship, Notice, NoticeDraft, NoticeId, NoticePatch, SeenBy};
use super::repository::NoticeRepository;
use super::service::{require_staff, required_text, retry_on_conflict, Clock, PlacementError, SystemClock};

static NOTICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_notice_id() -> NoticeId {
    let id = NOTICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NoticeId(format!("notice-{id:06}"))
}

/// A notice as seen by one caller.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    #[serde(flatten)]
    pub notice: Notice,
    pub seen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeenSummary {
    pub total: usize,
    pub read: usize,
    pub unread: usize,
}

/// Placement-cell notice board with per-user acknowledgement tracking.
pub struct NoticeBoard {
    notices: Arc<dyn NoticeRepository>,
    clock: Arc<dyn Clock>,
}

impl NoticeBoard {
    pub fn new(notices: Arc<dyn NoticeRepository>) -> Self {
        Self {
            notices,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn list(&self, actor: &Actor) -> Result<Vec<NoticeView>, PlacementError> {
        Ok(self
            .notices
            .list()?
            .into_iter()
            .map(|notice| NoticeView {
                seen: notice.seen_by_user(&actor.user_id),
                notice,
            })
            .collect())
    }

    pub fn create(&self, actor: &Actor, draft: NoticeDraft) -> Result<Notice, PlacementError> {
        require_staff(actor, "posting a notice")?;

        let notice = Notice {
            id: next_notice_id(),
            title: required_text(&draft.title, "title")?,
            description: required_text(&draft.description, "description")?,
            deadline: draft.deadline,
            authorship: Authorship::of(actor, self.clock.now()),
            seen_by: Vec::new(),
            revision: 0,
        };

        let stored = self.notices.insert(notice)?;
        info!(notice = %stored.id.0, "notice posted");
        Ok(stored)
    }

    pub fn update(
        &self,
        actor: &Actor,
        notice_id: &NoticeId,
        patch: NoticePatch,
    ) -> Result<Notice, PlacementError> {
        require_staff(actor, "updating a notice")?;

        retry_on_conflict(|| {
            let mut notice = self.fetch(notice_id)?;
            if let Some(title) = &patch.title {
                notice.title = required_text(title, "title")?;
            }
            if let Some(description) = &patch.description {
                notice.description = required_text(description, "description")?;
            }
            if let Some(deadline) = patch.deadline {
                notice.deadline = deadline;
            }
            Ok(self.notices.replace(notice)?)
        })
    }

    pub fn delete(&self, actor: &Actor, notice_id: &NoticeId) -> Result<Notice, PlacementError> {
        require_staff(actor, "deleting a notice")?;
        self.notices
            .remove(notice_id)?
            .ok_or(PlacementError::NoticeNotFound)
    }

    /// Flips the caller's acknowledgement. Returns whether the notice is now seen.
    pub fn toggle_seen(&self, actor: &Actor, notice_id: &NoticeId) -> Result<bool, PlacementError> {
        retry_on_conflict(|| {
            let mut notice = self.fetch(notice_id)?;

            let seen = match notice
                .seen_by
                .iter()
                .position(|entry| entry.user_id == actor.user_id)
            {
                Some(index) => {
                    notice.seen_by.remove(index);
                    false
                }
                None => {
                    notice.seen_by.push(SeenBy {
                        user_id: actor.user_id.clone(),
                        role: actor.role,
                        seen_at: self.clock.now(),
                    });
                    true
                }
            };

            self.notices.replace(notice)?;
            Ok(seen)
        })
    }

    pub fn seen_summary(&self, actor: &Actor) -> Result<SeenSummary, PlacementError> {
        let notices = self.notices.list()?;
        let read = notices
            .iter()
            .filter(|notice| notice.seen_by_user(&actor.user_id))
            .count();

        Ok(SeenSummary {
            total: notices.len(),
            read,
            unread: notices.len() - read,
        })
    }

    fn fetch(&self, notice_id: &NoticeId) -> Result<Notice, PlacementError> {
        self.notices
            .fetch(notice_id)?
            .ok_or(PlacementError::NoticeNotFound)
    }
}
