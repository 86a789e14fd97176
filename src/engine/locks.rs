use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::*;

use super::waitlist::Waitlist;

/// Queue-side state of one book. Only touched while holding that book's lock.
#[derive(Debug, Default)]
pub struct QueueState {
    pub waitlist: Waitlist,
    /// Front-biased subset of `waitlist`, at most `min(notify_limit, free copies)` long.
    pub notified: Vec<MemberId>,
}

impl QueueState {
    /// Drop a member from both the waitlist and the notified set.
    /// Returns whether the notified set changed.
    pub fn remove_member(&mut self, member_id: MemberId) -> bool {
        self.waitlist.remove(member_id);
        let before = self.notified.len();
        self.notified.retain(|&m| m != member_id);
        self.notified.len() != before
    }

    pub fn clear(&mut self) {
        self.waitlist = Waitlist::new();
        self.notified.clear();
    }
}

pub type SharedQueueState = Arc<Mutex<QueueState>>;

/// One mutex per book, created on first use and kept until the daily reset.
#[derive(Debug, Default)]
pub struct ResourceLockManager {
    locks: DashMap<BookId, SharedQueueState>,
}

impl ResourceLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic get-or-create. The shard lock is released before returning.
    pub fn get_or_create(&self, book_id: BookId) -> SharedQueueState {
        self.locks
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(QueueState::default())))
            .value()
            .clone()
    }

    pub fn get(&self, book_id: BookId) -> Option<SharedQueueState> {
        self.locks.get(&book_id).map(|e| e.value().clone())
    }

    /// Acquire the book's lock, creating it if needed.
    pub async fn lock(&self, book_id: BookId) -> OwnedMutexGuard<QueueState> {
        let state = self.get_or_create(book_id);
        let started = Instant::now();
        let guard = state.lock_owned().await;
        metrics::histogram!(crate::observability::LOCK_WAIT_SECONDS)
            .record(started.elapsed().as_secs_f64());
        guard
    }

    /// All known books with their state handles, ordered by book id.
    pub fn snapshot(&self) -> Vec<(BookId, SharedQueueState)> {
        let mut all: Vec<_> = self
            .locks
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn clear(&self) {
        self.locks.clear();
    }
}
