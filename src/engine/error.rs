use crate::catalog::CatalogError;
use crate::model::*;

/// Hard failures. Expected business outcomes (not present, queued, no
/// candidate) are returned as response values instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    BookNotFound(BookId),
    MemberNotFound(MemberId),
    ReservationNotFound(ReservationId),
    Catalog(String),
    /// An engine invariant was broken. Never recovered from locally.
    Consistency(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::BookNotFound(id) => write!(f, "book not found: {id}"),
            EngineError::MemberNotFound(id) => write!(f, "member not found: {id}"),
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::Catalog(e) => write!(f, "catalog error: {e}"),
            EngineError::Consistency(msg) => write!(f, "consistency violation: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::BookNotFound(id) => EngineError::BookNotFound(id),
            CatalogError::MemberNotFound(id) => EngineError::MemberNotFound(id),
            CatalogError::ReservationNotFound(id) => EngineError::ReservationNotFound(id),
            CatalogError::NoCopiesLeft(_) => {
                EngineError::Consistency("reservation committed with no free copy")
            }
            CatalogError::CopiesExceedTotal(_) => {
                EngineError::Consistency("copy returned to a book with every copy available")
            }
            CatalogError::Unavailable(msg) => EngineError::Catalog(msg),
        }
    }
}
