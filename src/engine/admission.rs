use std::time::Duration;

use tracing::{debug, error, info};

use crate::limits::*;
use crate::model::*;
use crate::observability::{APPROVALS_TOTAL, REQUESTS_TOTAL, RETURNS_TOTAL};

use super::{Engine, EngineError};

impl Engine {
    /// Ask for one copy of `book_id`. Grants immediately when the member is at
    /// the head of the queue (or nobody waits) and a copy is free; otherwise
    /// queues the member and reports their rank.
    pub async fn request_book(
        &self,
        member_id: MemberId,
        book_id: BookId,
        duration: Option<Duration>,
    ) -> Result<BorrowResponse, EngineError> {
        if !self.presence.is_active(member_id) {
            metrics::counter!(REQUESTS_TOTAL, "outcome" => "not_present").increment(1);
            return Ok(BorrowResponse::not_present());
        }
        if self
            .catalog
            .reservation_exists_active(member_id, book_id)
            .await?
        {
            metrics::counter!(REQUESTS_TOTAL, "outcome" => "already_held").increment(1);
            return Ok(BorrowResponse::already_held());
        }
        if !self.catalog.book_exists(book_id).await? {
            return Err(EngineError::BookNotFound(book_id));
        }
        if !self.catalog.member_is_registered(member_id).await? {
            return Err(EngineError::MemberNotFound(member_id));
        }
        let hold = self.config.resolve_hold(duration);

        let mut q = self.locks.lock(book_id).await;
        // Re-check under the lock: a concurrent request by the same member may
        // have been granted since the check above.
        if self
            .catalog
            .reservation_exists_active(member_id, book_id)
            .await?
        {
            metrics::counter!(REQUESTS_TOTAL, "outcome" => "already_held").increment(1);
            return Ok(BorrowResponse::already_held());
        }
        let free = self.catalog.available_copies(book_id).await?;
        let first = q.waitlist.peek_first();
        let preceded = first.is_some_and(|m| m != member_id);

        if !preceded && free > 0 {
            let reservation_id = self.commit_reservation(book_id, member_id, hold).await?;
            q.remove_member(member_id);
            self.forget_waiter(book_id, member_id);
            if let Err(e) = self.refill_notified(book_id, &mut q).await {
                error!("book {book_id}: notified set not refreshed after grant to {member_id}: {e}");
            }
            drop(q);

            info!("book {book_id}: granted to member {member_id} (reservation {reservation_id})");
            metrics::counter!(REQUESTS_TOTAL, "outcome" => "granted").increment(1);
            self.notify.send(
                book_id,
                &QueueEvent::Granted {
                    book_id,
                    member_id,
                    reservation_id,
                },
            );
            return Ok(BorrowResponse::granted(book_id, member_id, reservation_id));
        }

        if !q.waitlist.contains(member_id) {
            if q.waitlist.len() >= MAX_WAITLIST_LEN {
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "queue_full").increment(1);
                return Ok(BorrowResponse::queue_full());
            }
            q.waitlist.append_if_absent(member_id);
            self.track_waiter(book_id, member_id, hold);
        }
        let rank = q
            .waitlist
            .position_of(member_id)
            .ok_or(EngineError::Consistency("queued member missing from waitlist"))?;
        self.refill_notified(book_id, &mut q).await?;
        drop(q);

        debug!("book {book_id}: member {member_id} queued at rank {rank}");
        metrics::counter!(REQUESTS_TOTAL, "outcome" => "queued").increment(1);
        self.notify.send(
            book_id,
            &QueueEvent::Queued {
                book_id,
                member_id,
                rank,
            },
        );
        Ok(BorrowResponse::queued(rank, preceded))
    }

    /// Close a reservation and let the next waiters surface. Returns false if
    /// the reservation was already closed.
    pub async fn return_book(&self, reservation_id: ReservationId) -> Result<bool, EngineError> {
        let reservation = self
            .catalog
            .reservation(reservation_id)
            .await?
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        if !reservation.active || !self.catalog.close_reservation(reservation_id).await? {
            debug!("reservation {reservation_id} already closed");
            return Ok(false);
        }
        let book_id = reservation.book_id;
        self.catalog.increment_copies(book_id).await?;

        let mut q = self.locks.lock(book_id).await;
        if let Err(e) = self.refill_notified(book_id, &mut q).await {
            error!("book {book_id}: notified set not refreshed after return of {reservation_id}: {e}");
        }
        drop(q);

        info!("book {book_id}: reservation {reservation_id} returned by member {}", reservation.member_id);
        metrics::counter!(RETURNS_TOTAL).increment(1);
        self.notify.send(
            book_id,
            &QueueEvent::Returned {
                book_id,
                reservation_id,
            },
        );
        Ok(true)
    }

    /// Administrative grant to a specific waiter. Evaluated once: if the
    /// member is not queued, not present, or no copy is free, nothing happens.
    pub async fn approve_next_reader(
        &self,
        book_id: BookId,
        member_id: MemberId,
    ) -> Result<ApprovalResponse, EngineError> {
        let mut q = self.locks.lock(book_id).await;
        self.approve_locked(book_id, member_id, &mut q).await
    }

    /// Approve whoever heads the notified set, if anyone.
    pub async fn approve_front(&self, book_id: BookId) -> Result<ApprovalResponse, EngineError> {
        let mut q = self.locks.lock(book_id).await;
        let Some(&member_id) = q.notified.first() else {
            metrics::counter!(APPROVALS_TOTAL, "outcome" => "no_candidate").increment(1);
            return Ok(ApprovalResponse::no_candidate(book_id));
        };
        self.approve_locked(book_id, member_id, &mut q).await
    }

    async fn approve_locked(
        &self,
        book_id: BookId,
        member_id: MemberId,
        q: &mut super::QueueState,
    ) -> Result<ApprovalResponse, EngineError> {
        if !q.waitlist.contains(member_id) || !self.presence.is_active(member_id) {
            metrics::counter!(APPROVALS_TOTAL, "outcome" => "no_candidate").increment(1);
            return Ok(ApprovalResponse::no_candidate(book_id));
        }
        if self.catalog.available_copies(book_id).await? == 0 {
            metrics::counter!(APPROVALS_TOTAL, "outcome" => "no_candidate").increment(1);
            return Ok(ApprovalResponse::no_candidate(book_id));
        }

        let hold = self.durations.get(book_id, member_id);
        let reservation_id = self.commit_reservation(book_id, member_id, hold).await?;
        q.remove_member(member_id);
        self.forget_waiter(book_id, member_id);
        if let Err(e) = self.refill_notified(book_id, q).await {
            error!("book {book_id}: notified set not refreshed after approving {member_id}: {e}");
        }

        info!("book {book_id}: approved member {member_id} for {hold:?} (reservation {reservation_id})");
        metrics::counter!(APPROVALS_TOTAL, "outcome" => "approved").increment(1);
        self.notify.send(
            book_id,
            &QueueEvent::Granted {
                book_id,
                member_id,
                reservation_id,
            },
        );
        Ok(ApprovalResponse::approved(book_id, member_id, reservation_id))
    }
}
