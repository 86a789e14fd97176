use std::time::Duration;

use dashmap::DashMap;

use crate::model::*;

/// Requested hold length per queued (book, member) pair, recalled when the
/// member is finally granted the book.
#[derive(Debug)]
pub struct DurationTracker {
    entries: DashMap<WaitEntry, Duration>,
    default: Duration,
}

impl DurationTracker {
    pub fn new(default: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default,
        }
    }

    pub fn set(&self, book_id: BookId, member_id: MemberId, duration: Duration) {
        self.entries.insert(WaitEntry::new(book_id, member_id), duration);
    }

    /// Recorded duration, or the default hold if none was recorded.
    pub fn get(&self, book_id: BookId, member_id: MemberId) -> Duration {
        self.entries
            .get(&WaitEntry::new(book_id, member_id))
            .map(|e| *e.value())
            .unwrap_or(self.default)
    }

    pub fn remove(&self, book_id: BookId, member_id: MemberId) -> Option<Duration> {
        self.entries
            .remove(&WaitEntry::new(book_id, member_id))
            .map(|(_, d)| d)
    }

    /// O(entries).
    pub fn remove_all_for_member(&self, member_id: MemberId) {
        self.entries.retain(|k, _| k.member_id != member_id);
    }

    pub fn contains_member(&self, member_id: MemberId) -> bool {
        self.entries.iter().any(|e| e.key().member_id == member_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
