use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    BookNotFound(BookId),
    MemberNotFound(MemberId),
    ReservationNotFound(ReservationId),
    /// Decrement requested on a book with zero copies left.
    NoCopiesLeft(BookId),
    /// Increment requested on a book whose copies are all on the shelf.
    CopiesExceedTotal(BookId),
    Unavailable(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::BookNotFound(id) => write!(f, "book not found: {id}"),
            CatalogError::MemberNotFound(id) => write!(f, "member not found: {id}"),
            CatalogError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            CatalogError::NoCopiesLeft(id) => write!(f, "book {id} has no copies left"),
            CatalogError::CopiesExceedTotal(id) => {
                write!(f, "book {id} already has all copies available")
            }
            CatalogError::Unavailable(e) => write!(f, "catalog unavailable: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Books, members and reservation records. The engine reads copy counts and
/// commits reservations through this; it never stores catalog data itself.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    async fn available_copies(&self, book_id: BookId) -> Result<u32, CatalogError>;
    async fn decrement_copies(&self, book_id: BookId) -> Result<(), CatalogError>;
    async fn increment_copies(&self, book_id: BookId) -> Result<(), CatalogError>;
    async fn book_exists(&self, book_id: BookId) -> Result<bool, CatalogError>;

    async fn member_is_registered(&self, member_id: MemberId) -> Result<bool, CatalogError>;
    /// Members flagged active in storage. Read once at startup.
    async fn active_members(&self) -> Result<Vec<MemberId>, CatalogError>;
    async fn set_member_active(&self, member_id: MemberId, active: bool) -> Result<(), CatalogError>;
    async fn deactivate_all_members(&self) -> Result<(), CatalogError>;

    async fn create_reservation(
        &self,
        book_id: BookId,
        member_id: MemberId,
        start: Ms,
        expected_end: Ms,
    ) -> Result<ReservationId, CatalogError>;
    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, CatalogError>;
    /// Marks the reservation inactive. Returns false if it already was.
    async fn close_reservation(&self, id: ReservationId) -> Result<bool, CatalogError>;
    async fn reservation_exists_active(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<bool, CatalogError>;
    async fn overdue_reservations(&self, now: Ms) -> Result<Vec<Reservation>, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct BookRecord {
    pub title: String,
    pub total_copies: u32,
    pub available_copies: u32,
}

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
struct SeedBook {
    id: BookId,
    #[serde(default)]
    title: String,
    copies: u32,
}

#[derive(Debug, Deserialize)]
struct SeedMember {
    id: MemberId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct Seed {
    #[serde(default)]
    books: Vec<SeedBook>,
    #[serde(default)]
    members: Vec<SeedMember>,
}

/// Process-local catalog. Stands in for the database in the binary, tests and benches.
pub struct InMemoryCatalog {
    books: DashMap<BookId, BookRecord>,
    members: DashMap<MemberId, MemberRecord>,
    reservations: DashMap<ReservationId, Reservation>,
    next_reservation: AtomicU64,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            members: DashMap::new(),
            reservations: DashMap::new(),
            next_reservation: AtomicU64::new(1),
        }
    }

    /// Load books and members from a JSON seed file.
    pub fn from_seed_file(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read(path)?;
        let seed: Seed = serde_json::from_slice(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let catalog = Self::new();
        for b in seed.books {
            catalog.add_book(b.id, b.title, b.copies);
        }
        for m in seed.members {
            catalog.add_member(m.id, m.name, m.active);
        }
        Ok(catalog)
    }

    pub fn add_book(&self, id: BookId, title: impl Into<String>, copies: u32) {
        self.books.insert(
            id,
            BookRecord {
                title: title.into(),
                total_copies: copies,
                available_copies: copies,
            },
        );
    }

    pub fn add_member(&self, id: MemberId, name: impl Into<String>, active: bool) {
        self.members.insert(
            id,
            MemberRecord {
                name: name.into(),
                active,
            },
        );
    }

    pub fn remove_member(&self, id: MemberId) {
        self.members.remove(&id);
    }

    pub fn book(&self, id: BookId) -> Option<BookRecord> {
        self.books.get(&id).map(|e| e.value().clone())
    }

    pub fn member(&self, id: MemberId) -> Option<MemberRecord> {
        self.members.get(&id).map(|e| e.value().clone())
    }

    pub fn active_reservation_count(&self, book_id: BookId) -> usize {
        self.reservations
            .iter()
            .filter(|r| r.book_id == book_id && r.active)
            .count()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn available_copies(&self, book_id: BookId) -> Result<u32, CatalogError> {
        self.books
            .get(&book_id)
            .map(|b| b.available_copies)
            .ok_or(CatalogError::BookNotFound(book_id))
    }

    async fn decrement_copies(&self, book_id: BookId) -> Result<(), CatalogError> {
        let mut book = self
            .books
            .get_mut(&book_id)
            .ok_or(CatalogError::BookNotFound(book_id))?;
        if book.available_copies == 0 {
            return Err(CatalogError::NoCopiesLeft(book_id));
        }
        book.available_copies -= 1;
        Ok(())
    }

    async fn increment_copies(&self, book_id: BookId) -> Result<(), CatalogError> {
        let mut book = self
            .books
            .get_mut(&book_id)
            .ok_or(CatalogError::BookNotFound(book_id))?;
        if book.available_copies >= book.total_copies {
            tracing::error!(
                "book {book_id}: return would raise available copies above total {}",
                book.total_copies
            );
            return Err(CatalogError::CopiesExceedTotal(book_id));
        }
        book.available_copies += 1;
        Ok(())
    }

    async fn book_exists(&self, book_id: BookId) -> Result<bool, CatalogError> {
        Ok(self.books.contains_key(&book_id))
    }

    async fn member_is_registered(&self, member_id: MemberId) -> Result<bool, CatalogError> {
        Ok(self.members.contains_key(&member_id))
    }

    async fn active_members(&self) -> Result<Vec<MemberId>, CatalogError> {
        Ok(self
            .members
            .iter()
            .filter(|m| m.active)
            .map(|m| *m.key())
            .collect())
    }

    async fn set_member_active(&self, member_id: MemberId, active: bool) -> Result<(), CatalogError> {
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(CatalogError::MemberNotFound(member_id))?;
        member.active = active;
        Ok(())
    }

    async fn deactivate_all_members(&self) -> Result<(), CatalogError> {
        for mut m in self.members.iter_mut() {
            m.active = false;
        }
        Ok(())
    }

    async fn create_reservation(
        &self,
        book_id: BookId,
        member_id: MemberId,
        start: Ms,
        expected_end: Ms,
    ) -> Result<ReservationId, CatalogError> {
        if !self.books.contains_key(&book_id) {
            return Err(CatalogError::BookNotFound(book_id));
        }
        if !self.members.contains_key(&member_id) {
            return Err(CatalogError::MemberNotFound(member_id));
        }
        let id = self.next_reservation.fetch_add(1, Ordering::Relaxed);
        self.reservations.insert(
            id,
            Reservation {
                id,
                book_id,
                member_id,
                start,
                expected_end,
                active: true,
            },
        );
        Ok(id)
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, CatalogError> {
        Ok(self.reservations.get(&id).map(|r| r.value().clone()))
    }

    async fn close_reservation(&self, id: ReservationId) -> Result<bool, CatalogError> {
        let mut r = self
            .reservations
            .get_mut(&id)
            .ok_or(CatalogError::ReservationNotFound(id))?;
        let was_active = r.active;
        r.active = false;
        Ok(was_active)
    }

    async fn reservation_exists_active(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<bool, CatalogError> {
        Ok(self
            .reservations
            .iter()
            .any(|r| r.active && r.member_id == member_id && r.book_id == book_id))
    }

    async fn overdue_reservations(&self, now: Ms) -> Result<Vec<Reservation>, CatalogError> {
        let mut out: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.is_overdue(now))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by_key(|r| r.expected_end);
        Ok(out)
    }
}

/// Distinct ids, in first-seen order.
pub(crate) fn dedup_ids(ids: Vec<MemberId>) -> Vec<MemberId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
