use tracing::{info, warn};

use crate::model::*;
use crate::observability::{DEPARTURES_TOTAL, MEMBERS_ACTIVE, RESETS_TOTAL};

use super::selector::record_waitlist_len;
use super::{Engine, EngineError};

impl Engine {
    /// Mark a member present. Idempotent.
    pub async fn enter(&self, member_id: MemberId) {
        if !self.presence.enter(member_id) {
            return;
        }
        info!("member {member_id} entered");
        metrics::gauge!(MEMBERS_ACTIVE).set(self.presence.len() as f64);
        self.mirror_presence(member_id, true).await;
    }

    /// Mark a member absent and pull them out of every queue they wait in.
    /// A no-op for members who are not present and not queued.
    pub async fn leave(&self, member_id: MemberId) -> Result<(), EngineError> {
        let was_present = self.presence.leave(member_id);
        self.durations.remove_all_for_member(member_id);

        let mut books: Vec<BookId> = self
            .waiting
            .remove(&member_id)
            .map(|(_, books)| books.into_iter().collect())
            .unwrap_or_default();
        books.sort_unstable();

        let mut first_err = None;
        for book_id in books {
            let Some(state) = self.locks.get(book_id) else {
                continue;
            };
            let mut q = state.lock_owned().await;
            let notified_changed = q.remove_member(member_id);
            if q.waitlist.is_empty() {
                q.clear();
            }
            if notified_changed {
                if let Err(e) = self.refill_notified(book_id, &mut q).await {
                    warn!("book {book_id}: refill after departure of {member_id} failed: {e}");
                    first_err.get_or_insert(e);
                }
            } else {
                record_waitlist_len(book_id, q.waitlist.len());
            }
            drop(q);
            self.notify.send(book_id, &QueueEvent::Departed { book_id, member_id });
        }

        if was_present {
            info!("member {member_id} left");
            metrics::counter!(DEPARTURES_TOTAL).increment(1);
            metrics::gauge!(MEMBERS_ACTIVE).set(self.presence.len() as f64);
            self.mirror_presence(member_id, false).await;
        }
        first_err.map_or(Ok(()), Err)
    }

    /// End-of-day wipe: presence, queues, notified sets, durations and locks
    /// are dropped, and every catalog member is flagged inactive.
    pub async fn daily_reset(&self) -> Result<(), EngineError> {
        info!("daily reset: clearing {} members, {} books", self.presence.len(), self.locks.len());
        self.presence.clear();
        for (book_id, _) in self.locks.snapshot() {
            record_waitlist_len(book_id, 0);
        }
        self.locks.clear();
        self.waiting.clear();
        self.durations.clear();
        self.notify.send_all(&QueueEvent::Reset);
        metrics::counter!(RESETS_TOTAL).increment(1);
        metrics::gauge!(MEMBERS_ACTIVE).set(0.0);
        self.catalog.deactivate_all_members().await?;
        Ok(())
    }

    pub fn is_active(&self, member_id: MemberId) -> bool {
        self.presence.is_active(member_id)
    }

    /// Keep the catalog's stored flag in step. Failure is logged, never surfaced.
    async fn mirror_presence(&self, member_id: MemberId, active: bool) {
        if let Err(e) = self.catalog.set_member_active(member_id, active).await {
            warn!("member {member_id}: could not store active={active}: {e}");
        }
    }
}
