use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub type MemberId = u64;
pub type BookId = u64;
pub type ReservationId = u64;

/// A queued (book, member) pair. Keys the duration tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitEntry {
    pub book_id: BookId,
    pub member_id: MemberId,
}

impl WaitEntry {
    pub fn new(book_id: BookId, member_id: MemberId) -> Self {
        Self { book_id, member_id }
    }
}

/// A member holding one copy of a book for `[start, expected_end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub start: Ms,
    pub expected_end: Ms,
    pub active: bool,
}

impl Reservation {
    pub fn is_overdue(&self, now: Ms) -> bool {
        self.active && self.expected_end < now
    }
}

/// Outcome of a borrow request. Business conditions land here, not in `EngineError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowResponse {
    pub success: bool,
    pub message: String,
    /// 1-based waitlist position, present only when the member was queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<ReservationId>,
}

impl BorrowResponse {
    pub fn granted(book_id: BookId, member_id: MemberId, reservation_id: ReservationId) -> Self {
        Self {
            success: true,
            message: format!("book {book_id} assigned successfully to member {member_id}"),
            rank: None,
            reservation_id: Some(reservation_id),
        }
    }

    pub fn not_present() -> Self {
        Self {
            success: false,
            message: "member is not present in the library".into(),
            rank: None,
            reservation_id: None,
        }
    }

    pub fn already_held() -> Self {
        Self {
            success: true,
            message: "you have already borrowed this book".into(),
            rank: None,
            reservation_id: None,
        }
    }

    pub fn queued(rank: usize, preceded: bool) -> Self {
        let message = if preceded {
            "book not available. someone else requested this book first, you'll get your turn soon! you are in the waiting list."
        } else {
            "book not available. you are in the waiting list."
        };
        Self {
            success: false,
            message: message.into(),
            rank: Some(rank),
            reservation_id: None,
        }
    }

    pub fn queue_full() -> Self {
        Self {
            success: false,
            message: "waiting list for this book is full".into(),
            rank: None,
            reservation_id: None,
        }
    }
}

/// Outcome of an administrative approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<ReservationId>,
}

impl ApprovalResponse {
    pub fn approved(book_id: BookId, member_id: MemberId, reservation_id: ReservationId) -> Self {
        Self {
            success: true,
            message: format!("book {book_id} assigned successfully to member {member_id}"),
            reservation_id: Some(reservation_id),
        }
    }

    pub fn no_candidate(book_id: BookId) -> Self {
        Self {
            success: false,
            message: format!("no eligible candidate for book {book_id}"),
            reservation_id: None,
        }
    }
}

/// One row of the approver's notification list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCandidate {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub requested: Duration,
}

/// Queue-side happenings published per book through the notify hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueEvent {
    Granted {
        book_id: BookId,
        member_id: MemberId,
        reservation_id: ReservationId,
    },
    Queued {
        book_id: BookId,
        member_id: MemberId,
        rank: usize,
    },
    NotifiedChanged {
        book_id: BookId,
        members: Vec<MemberId>,
    },
    Departed {
        book_id: BookId,
        member_id: MemberId,
    },
    Returned {
        book_id: BookId,
        reservation_id: ReservationId,
    },
    Reset,
}
