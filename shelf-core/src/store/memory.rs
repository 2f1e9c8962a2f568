//! In-memory storage backends.
//!
//! Books live in a `DashMap`; similarity rows live in one `RwLock`ed table so
//! a commit becomes visible to readers all at once. Both stores can arm a
//! fault that fails a chosen operation, which is how tests exercise rollback.
//!
//! The edge table also remembers deleted book ids. An open recompute
//! transaction refuses to stage rows for them and drops any staged row that
//! a later delete orphaned, so the committed graph never references a
//! missing book.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;

use super::{BookStore, SimilarityStore, SimilarityTx};
use crate::book::{Book, BookId, BookUpdate, NewBook};
use crate::error::StoreError;
use crate::filter::FilterQuery;

/// Countdown that fails the operation after `n` successful ones.
#[derive(Debug)]
struct Fault {
    /// Successful calls left before failing; negative when disarmed.
    remaining: AtomicI64,
}

impl Default for Fault {
    fn default() -> Self {
        Self {
            remaining: AtomicI64::new(-1),
        }
    }
}

impl Fault {
    fn arm(&self, after: usize) {
        self.remaining.store(after as i64, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.remaining.store(-1, Ordering::SeqCst);
    }

    fn check(&self, what: &str) -> Result<(), StoreError> {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                n if n > 0 => Some(n - 1),
                0 => Some(-1),
                _ => None,
            });
        match previous {
            Ok(0) => Err(StoreError::Injected(format!("{what} failed"))),
            _ => Ok(()),
        }
    }
}

/// Process-local book store.
#[derive(Default)]
pub struct MemoryBookStore {
    books: DashMap<BookId, Book>,
    next_id: AtomicI64,
    /// Serializes writers so ISBN uniqueness holds.
    write_lock: Mutex<()>,
    similarity: Option<Arc<MemorySimilarityStore>>,
    list_fault: Fault,
    genre_fault: Fault,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book store whose deletes also drop rows from `similarity`.
    pub fn linked_to(similarity: Arc<MemorySimilarityStore>) -> Self {
        Self {
            similarity: Some(similarity),
            ..Self::default()
        }
    }

    /// Fail the `list_all` call that follows `after` successful ones.
    pub fn fail_list_after(&self, after: usize) {
        self.list_fault.arm(after);
    }

    /// Fail the genre-group read that follows `after` successful ones.
    pub fn fail_genre_reads_after(&self, after: usize) {
        self.genre_fault.arm(after);
    }

    pub fn clear_faults(&self) {
        self.list_fault.disarm();
        self.genre_fault.disarm();
    }

    fn sorted(&self, filter: impl Fn(&Book) -> bool) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        books.sort_by_key(|book| book.id);
        books
    }

    fn ensure_isbn_free(&self, isbn: Option<&str>, owner: Option<BookId>) -> Result<(), StoreError> {
        let Some(isbn) = isbn else {
            return Ok(());
        };
        let taken = self
            .books
            .iter()
            .any(|entry| entry.isbn.as_deref() == Some(isbn) && Some(entry.id) != owner);
        if taken {
            Err(StoreError::Conflict(format!(
                "a book with ISBN {isbn} already exists"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        self.list_fault.check("list books")?;
        Ok(self.sorted(|_| true))
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.books.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        Ok(self
            .books
            .iter()
            .find(|entry| entry.isbn.as_deref() == Some(isbn))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_genre_excluding(
        &self,
        genre: &str,
        exclude_id: BookId,
    ) -> Result<Vec<Book>, StoreError> {
        self.genre_fault.check("genre group read")?;
        Ok(self.sorted(|book| book.genre == genre && book.id != exclude_id))
    }

    async fn list_genres(&self) -> Result<Vec<String>, StoreError> {
        let genres: BTreeSet<String> = self
            .books
            .iter()
            .filter(|entry| !entry.genre.is_empty())
            .map(|entry| entry.genre.clone())
            .collect();
        Ok(genres.into_iter().collect())
    }

    async fn find_by_genres(&self, genres: &[String]) -> Result<Vec<Book>, StoreError> {
        Ok(self.sorted(|book| genres.iter().any(|genre| *genre == book.genre)))
    }

    async fn find_by_criteria(&self, query: &FilterQuery) -> Result<Vec<Book>, StoreError> {
        Ok(self.sorted(|book| query.matches(book)))
    }

    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        self.ensure_isbn_free(book.isbn.as_deref(), None)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let book = book.into_book(id, Utc::now().date_naive());
        self.books.insert(id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, update: BookUpdate) -> Result<Book, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        self.ensure_isbn_free(update.isbn.as_deref(), Some(id))?;

        let mut entry = self.books.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.apply(update);
        Ok(entry.value().clone())
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        self.books.remove(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(similarity) = &self.similarity {
            similarity.remove_book(id);
        }
        Ok(())
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryBookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBookStore")
            .field("books", &self.books.len())
            .finish()
    }
}

/// Committed rows plus the ids of deleted books.
#[derive(Debug, Default)]
struct EdgeTable {
    rows: BTreeSet<(BookId, BookId)>,
    /// Ids are never reused, so this only grows.
    removed: BTreeSet<BookId>,
}

impl EdgeTable {
    fn references_removed(&self, &(a, b): &(BookId, BookId)) -> bool {
        self.removed.contains(&a) || self.removed.contains(&b)
    }
}

/// Process-local similarity store with snapshot transactions.
#[derive(Default)]
pub struct MemorySimilarityStore {
    edges: Arc<RwLock<EdgeTable>>,
    /// Held by the open recompute transaction.
    recompute_lock: Arc<tokio::sync::Mutex<()>>,
    insert_fault: Arc<Fault>,
}

impl MemorySimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `insert_pair` call that follows `after` successful ones.
    pub fn fail_inserts_after(&self, after: usize) {
        self.insert_fault.arm(after);
    }

    pub fn clear_faults(&self) {
        self.insert_fault.disarm();
    }

    /// Committed directed rows, ascending.
    pub fn edges(&self) -> Vec<(BookId, BookId)> {
        self.read().rows.iter().copied().collect()
    }

    /// Drop every row that references `id`, including rows an open
    /// transaction has staged but not committed yet.
    pub fn remove_book(&self, id: BookId) {
        let mut table = self.write();
        table.rows.retain(|&(a, b)| a != id && b != id);
        table.removed.insert(id);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EdgeTable> {
        self.edges.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EdgeTable> {
        self.edges.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SimilarityStore for MemorySimilarityStore {
    async fn begin_recompute(&self) -> Result<Box<dyn SimilarityTx>, StoreError> {
        let guard = Arc::clone(&self.recompute_lock).lock_owned().await;
        Ok(Box::new(MemorySimilarityTx {
            edges: Arc::clone(&self.edges),
            staged: BTreeSet::new(),
            insert_fault: Arc::clone(&self.insert_fault),
            _guard: guard,
        }))
    }

    async fn neighbors(&self, id: BookId) -> Result<Vec<BookId>, StoreError> {
        Ok(self
            .read()
            .rows
            .range((id, BookId::MIN)..=(id, BookId::MAX))
            .map(|&(_, b)| b)
            .collect())
    }

    async fn edge_count(&self) -> Result<i64, StoreError> {
        Ok(self.read().rows.len() as i64)
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl std::fmt::Debug for MemorySimilarityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySimilarityStore")
            .field("edges", &self.read().rows.len())
            .finish()
    }
}

/// Writes staged privately until commit.
struct MemorySimilarityTx {
    edges: Arc<RwLock<EdgeTable>>,
    staged: BTreeSet<(BookId, BookId)>,
    insert_fault: Arc<Fault>,
    _guard: OwnedMutexGuard<()>,
}

impl MemorySimilarityTx {
    fn table(&self) -> std::sync::RwLockReadGuard<'_, EdgeTable> {
        self.edges.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn committed(&self, row: &(BookId, BookId)) -> bool {
        self.table().rows.contains(row)
    }
}

#[async_trait]
impl SimilarityTx for MemorySimilarityTx {
    async fn exists(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError> {
        let row = (a, b);
        Ok(self.staged.contains(&row) || self.committed(&row))
    }

    async fn insert_pair(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError> {
        if a == b {
            return Err(StoreError::Query(format!("self-edge rejected for book {a}")));
        }
        self.insert_fault.check("similarity insert")?;
        if self.table().references_removed(&(a, b)) {
            return Err(StoreError::Query(format!(
                "similarity row ({a}, {b}) references a deleted book"
            )));
        }

        let mut inserted = false;
        for row in [(a, b), (b, a)] {
            if !self.committed(&row) {
                inserted |= self.staged.insert(row);
            }
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut table = self
            .edges
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let live: Vec<_> = self
            .staged
            .iter()
            .copied()
            .filter(|row| !table.references_removed(row))
            .collect();
        table.rows.extend(live);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
