mod admission;
mod departure;
mod durations;
mod error;
mod locks;
mod presence;
mod queries;
mod selector;
mod waitlist;

pub use durations::DurationTracker;
pub use error::EngineError;
pub use locks::{QueueState, ResourceLockManager, SharedQueueState};
pub use presence::PresenceRegistry;
pub use waitlist::Waitlist;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::catalog::Catalog;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on surfaced waiters per book, before the free-copy bound.
    pub notify_limit: usize,
    pub default_hold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notify_limit: DEFAULT_NOTIFY_LIMIT,
            default_hold: DEFAULT_HOLD,
        }
    }
}

impl EngineConfig {
    /// Requested hold, defaulted when absent and clamped into `[MIN_HOLD, MAX_HOLD]`.
    pub fn resolve_hold(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_hold)
            .clamp(MIN_HOLD, MAX_HOLD)
    }
}

/// Waiting-queue and reservation-admission engine.
///
/// All waitlist/notified state of a book lives behind that book's lock in
/// `locks`; presence, durations and the member → books index are
/// process-wide concurrent maps needing no cross-book consistency.
pub struct Engine {
    pub(super) catalog: Arc<dyn Catalog>,
    pub(super) presence: PresenceRegistry,
    pub(super) durations: DurationTracker,
    pub(super) locks: ResourceLockManager,
    /// Reverse lookup: member → books they are queued for.
    pub(super) waiting: DashMap<MemberId, HashSet<BookId>>,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
}

impl Engine {
    pub fn new(catalog: Arc<dyn Catalog>, notify: Arc<NotifyHub>, config: EngineConfig) -> Self {
        Self {
            catalog,
            presence: PresenceRegistry::new(),
            durations: DurationTracker::new(config.default_hold),
            locks: ResourceLockManager::new(),
            waiting: DashMap::new(),
            notify,
            config,
        }
    }

    /// Build an engine and seed presence from the catalog's active members.
    pub async fn bootstrap(
        catalog: Arc<dyn Catalog>,
        notify: Arc<NotifyHub>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let engine = Self::new(catalog, notify, config);
        let active = crate::catalog::dedup_ids(engine.catalog.active_members().await?);
        tracing::info!("seeding {} active members", active.len());
        engine.presence.seed(active);
        metrics::gauge!(crate::observability::MEMBERS_ACTIVE).set(engine.presence.len() as f64);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record that `member_id` waits on `book_id`: duration plus reverse index.
    pub(super) fn track_waiter(&self, book_id: BookId, member_id: MemberId, hold: Duration) {
        self.durations.set(book_id, member_id, hold);
        self.waiting.entry(member_id).or_default().insert(book_id);
    }

    /// Undo `track_waiter` for one pair.
    pub(super) fn forget_waiter(&self, book_id: BookId, member_id: MemberId) {
        self.durations.remove(book_id, member_id);
        self.waiting.remove_if_mut(&member_id, |_, books| {
            books.remove(&book_id);
            books.is_empty()
        });
    }

    /// Decrement the book's copies and persist a reservation. Caller holds the book lock.
    pub(super) async fn commit_reservation(
        &self,
        book_id: BookId,
        member_id: MemberId,
        hold: Duration,
    ) -> Result<ReservationId, EngineError> {
        let start = now_ms();
        let expected_end = start + hold.as_millis() as Ms;
        self.catalog.decrement_copies(book_id).await?;
        match self
            .catalog
            .create_reservation(book_id, member_id, start, expected_end)
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                // put the copy back so the count matches the reservations that exist
                if let Err(undo) = self.catalog.increment_copies(book_id).await {
                    tracing::error!("book {book_id}: copy count not restored after failed reservation: {undo}");
                }
                Err(e.into())
            }
        }
    }
}

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}
