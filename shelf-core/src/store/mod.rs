//! Storage contracts for books and similarity edges.
//!
//! Two backends implement them:
//! - **Memory** (`MemoryBookStore`, `MemorySimilarityStore`): process-local,
//!   used by tests and as the server fallback when no database is configured.
//! - **PostgreSQL** (`PgBookStore`, `PgSimilarityStore`, feature `postgres`):
//!   the durable backend, schema in `migrations/`.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{MemoryBookStore, MemorySimilarityStore};
#[cfg(feature = "postgres")]
pub use postgres::{connect, migrate, PgBookStore, PgSimilarityStore};

use async_trait::async_trait;

use crate::book::{Book, BookId, BookUpdate, NewBook};
use crate::error::StoreError;
use crate::filter::FilterQuery;

/// Durable storage of book records.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Every book, in storage (identifier) order.
    async fn list_all(&self) -> Result<Vec<Book>, StoreError>;

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError>;

    /// Books whose genre equals `genre` exactly, other than `exclude_id`.
    async fn find_by_genre_excluding(
        &self,
        genre: &str,
        exclude_id: BookId,
    ) -> Result<Vec<Book>, StoreError>;

    /// Distinct non-empty genre labels, ascending.
    async fn list_genres(&self) -> Result<Vec<String>, StoreError>;

    /// Books whose genre equals any of `genres` exactly.
    async fn find_by_genres(&self, genres: &[String]) -> Result<Vec<Book>, StoreError>;

    /// Execute a composed filter.
    async fn find_by_criteria(&self, query: &FilterQuery) -> Result<Vec<Book>, StoreError>;

    /// Insert a book; the store assigns `id` and `included_on`.
    async fn insert(&self, book: NewBook) -> Result<Book, StoreError>;

    /// Replace the mutable fields of an existing book.
    async fn update(&self, id: BookId, update: BookUpdate) -> Result<Book, StoreError>;

    /// Remove a book and the similarity rows that reference it.
    async fn delete(&self, id: BookId) -> Result<(), StoreError>;

    async fn check_health(&self) -> Result<(), StoreError>;
}

/// Durable storage of similarity edges.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Open the transaction that scopes one recompute pass.
    ///
    /// Backends shared between processes take an exclusive lock here that
    /// is held until the transaction ends.
    async fn begin_recompute(&self) -> Result<Box<dyn SimilarityTx>, StoreError>;

    /// Identifiers linked to `id`, ascending.
    async fn neighbors(&self, id: BookId) -> Result<Vec<BookId>, StoreError>;

    /// Number of directed rows.
    async fn edge_count(&self) -> Result<i64, StoreError>;

    async fn check_health(&self) -> Result<(), StoreError>;
}

/// An open similarity transaction.
///
/// Nothing written through it is visible to other readers before
/// [`commit`](SimilarityTx::commit). Dropping it uncommitted discards every
/// write.
#[async_trait]
pub trait SimilarityTx: Send {
    /// Whether the directed row `a -> b` exists, including rows written
    /// earlier in this transaction.
    async fn exists(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError>;

    /// Insert both `a -> b` and `b -> a`, skipping rows already present.
    /// Returns true when at least one row was new.
    async fn insert_pair(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
