use crate::catalog::CatalogError;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Who the approver should act on next, ordered by book id then by
    /// notification order. Re-checked at read time against presence and the
    /// book's free copies.
    pub async fn list_notification_candidates(&self) -> Result<Vec<NotificationCandidate>, EngineError> {
        let mut out = Vec::new();
        for (book_id, state) in self.locks.snapshot() {
            let q = state.lock().await;
            if q.notified.is_empty() {
                continue;
            }
            let free = match self.catalog.available_copies(book_id).await {
                Ok(n) => n as usize,
                Err(CatalogError::BookNotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            out.extend(
                q.notified
                    .iter()
                    .copied()
                    .filter(|&m| self.presence.is_active(m))
                    .take(free)
                    .map(|member_id| NotificationCandidate {
                        book_id,
                        member_id,
                        requested: self.durations.get(book_id, member_id),
                    }),
            );
        }
        Ok(out)
    }

    /// Waitlist of a book, front first. Empty if nobody waits.
    pub async fn waitlist(&self, book_id: BookId) -> Vec<MemberId> {
        match self.locks.get(book_id) {
            Some(state) => state.lock().await.waitlist.to_vec(),
            None => Vec::new(),
        }
    }

    /// Current notified set of a book.
    pub async fn notified(&self, book_id: BookId) -> Vec<MemberId> {
        match self.locks.get(book_id) {
            Some(state) => state.lock().await.notified.clone(),
            None => Vec::new(),
        }
    }

    /// 1-based queue position of a member, if queued.
    pub async fn rank(&self, book_id: BookId, member_id: MemberId) -> Option<usize> {
        let state = self.locks.get(book_id)?;
        let q = state.lock().await;
        q.waitlist.position_of(member_id)
    }

    /// Books the member is currently queued for, ascending.
    pub fn waiting_on(&self, member_id: MemberId) -> Vec<BookId> {
        let mut books: Vec<BookId> = self
            .waiting
            .get(&member_id)
            .map(|e| e.value().iter().copied().collect())
            .unwrap_or_default();
        books.sort_unstable();
        books
    }

    pub fn has_durations_for(&self, member_id: MemberId) -> bool {
        self.durations.contains_member(member_id)
    }

    pub fn active_member_count(&self) -> usize {
        self.presence.len()
    }

    pub fn tracked_book_count(&self) -> usize {
        self.locks.len()
    }

    /// Active reservations past their expected end.
    pub async fn overdue_reservations(&self, now: Ms) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.catalog.overdue_reservations(now).await?)
    }
}
