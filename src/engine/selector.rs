use tracing::debug;

use crate::catalog::CatalogError;
use crate::model::*;

use super::locks::QueueState;
use super::{Engine, EngineError};

impl Engine {
    /// Is this waiter still allowed to be surfaced: present and still a catalog member.
    async fn is_eligible(&self, member_id: MemberId) -> Result<bool, EngineError> {
        if !self.presence.is_active(member_id) {
            return Ok(false);
        }
        Ok(self.catalog.member_is_registered(member_id).await?)
    }

    /// Free copies as seen by the selector. A book gone from the catalog has none.
    async fn free_copies(&self, book_id: BookId) -> Result<u32, EngineError> {
        match self.catalog.available_copies(book_id).await {
            Ok(n) => Ok(n),
            Err(CatalogError::BookNotFound(_)) => {
                tracing::warn!("book {book_id} vanished from catalog while queued");
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild the notified set of `book_id` from the front of its waitlist.
    ///
    /// Caller holds the book's lock (`q` is its guarded state). Stale waiters
    /// met during the scan are dropped from the queue. The rebuilt set replaces
    /// the old one wholesale and never exceeds `min(notify_limit, free copies)`.
    /// On error the previous set is left in place. Returns whether the set changed.
    pub(super) async fn refill_notified(
        &self,
        book_id: BookId,
        q: &mut QueueState,
    ) -> Result<bool, EngineError> {
        let changed = self.rebuild_notified(book_id, q).await;
        record_waitlist_len(book_id, q.waitlist.len());
        changed
    }

    async fn rebuild_notified(&self, book_id: BookId, q: &mut QueueState) -> Result<bool, EngineError> {
        if q.waitlist.is_empty() {
            q.waitlist = Default::default();
            let previous = std::mem::take(&mut q.notified);
            return Ok(self.publish_notified(book_id, &previous, &q.notified));
        }

        let (rebuilt, stale) = self.scan_front(book_id, q).await?;

        for &member_id in &stale {
            q.waitlist.remove(member_id);
            self.forget_waiter(book_id, member_id);
            debug!("book {book_id}: purged stale waiter {member_id}");
        }
        if !stale.is_empty() {
            metrics::counter!(crate::observability::STALE_WAITERS_PURGED_TOTAL)
                .increment(stale.len() as u64);
        }
        if q.waitlist.is_empty() {
            q.waitlist = Default::default();
        }

        let previous = std::mem::replace(&mut q.notified, rebuilt);
        Ok(self.publish_notified(book_id, &previous, &q.notified))
    }

    /// Walk the waitlist front to back, splitting it into up to `cap` eligible
    /// members and the stale ones met on the way. Does not touch `q`.
    async fn scan_front(
        &self,
        book_id: BookId,
        q: &QueueState,
    ) -> Result<(Vec<MemberId>, Vec<MemberId>), EngineError> {
        let free = self.free_copies(book_id).await? as usize;
        let cap = self.config.notify_limit.min(free);

        let mut eligible = Vec::with_capacity(cap);
        let mut stale = Vec::new();
        if cap == 0 {
            return Ok((eligible, stale));
        }
        for member_id in q.waitlist.iter() {
            if eligible.len() >= cap {
                break;
            }
            if self.is_eligible(member_id).await? {
                eligible.push(member_id);
            } else {
                stale.push(member_id);
            }
        }
        Ok((eligible, stale))
    }

    fn publish_notified(&self, book_id: BookId, previous: &[MemberId], current: &[MemberId]) -> bool {
        if previous == current {
            return false;
        }
        debug!("book {book_id}: notified set now {current:?}");
        self.notify.send(
            book_id,
            &QueueEvent::NotifiedChanged {
                book_id,
                members: current.to_vec(),
            },
        );
        true
    }
}

pub(super) fn record_waitlist_len(book_id: BookId, len: usize) {
    metrics::gauge!(crate::observability::WAITLIST_LENGTH, "book" => book_id.to_string())
        .set(len as f64);
}
