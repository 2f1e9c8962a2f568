use std::fmt;

use thiserror::Error;

use crate::book::BookId;

/// Malformed caller input: a filter field that cannot be parsed or a book
/// payload that breaks the record invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Storage read/write failures raised by a `BookStore` or `SimilarityStore`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Book not found: {0}")]
    NotFound(BookId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    /// Raised by the in-memory backend when a write fault was armed.
    #[error("Injected storage fault: {0}")]
    Injected(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(e.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

/// Step of a recompute pass at which a storage error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputePhase {
    /// Opening or committing the similarity transaction.
    Transaction,
    /// Loading the full book list.
    CatalogRead,
    /// Loading the books that share a genre with the current book.
    GenreGroupRead,
    /// Checking for or inserting a similarity edge.
    EdgeWrite,
}

impl fmt::Display for RecomputePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => write!(f, "transaction"),
            Self::CatalogRead => write!(f, "catalog read"),
            Self::GenreGroupRead => write!(f, "genre group read"),
            Self::EdgeWrite => write!(f, "edge write"),
        }
    }
}

/// Failure of a whole recompute pass. The similarity graph is unchanged
/// whenever one of these is returned.
#[derive(Error, Debug)]
pub enum RecomputeError {
    #[error("Similarity recompute failed during {phase}: {source}")]
    Failed {
        phase: RecomputePhase,
        #[source]
        source: StoreError,
    },

    #[error("A similarity recompute is already running")]
    AlreadyRunning,

    #[error("Similarity recompute timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

impl RecomputeError {
    pub(crate) fn at(phase: RecomputePhase) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Failed { phase, source }
    }

    /// Phase tag, when the pass failed on a storage error.
    pub fn phase(&self) -> Option<RecomputePhase> {
        match self {
            Self::Failed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Failures of the external ISBN metadata service.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No metadata found for ISBN {0}")]
    NotFound(String),

    #[error("Metadata service error: {0}")]
    Service(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Umbrella error for catalog operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Recompute(#[from] RecomputeError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
