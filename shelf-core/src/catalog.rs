//! Catalog operations over a book store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::book::{validate_isbn, Book, BookId, BookUpdate, NewBook};
use crate::error::{LookupError, Result, StoreError};
use crate::filter::{build_filter, FilterCriteria};
use crate::lookup::BookMetadataSource;
use crate::store::{BookStore, SimilarityStore};

/// Result ordering for [`CatalogService::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Storage order (ascending identifier).
    #[default]
    Unsorted,
    /// Ascending title, ties by identifier.
    Title,
}

/// Outcome of [`CatalogService::register_by_isbn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A book with this ISBN was already cataloged; it is returned unchanged.
    Existing(Book),
    Created(Book),
}

impl ImportOutcome {
    pub fn book(&self) -> &Book {
        match self {
            Self::Existing(book) | Self::Created(book) => book,
        }
    }

    pub fn into_book(self) -> Book {
        match self {
            Self::Existing(book) | Self::Created(book) => book,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Book registration, maintenance and search.
#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookStore>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookStore>) -> Self {
        Self { books }
    }

    pub fn store(&self) -> &Arc<dyn BookStore> {
        &self.books
    }

    #[instrument(level = "info", skip_all, fields(title = %book.title))]
    pub async fn register(&self, book: NewBook) -> Result<Book> {
        let book = book.normalized();
        book.validate()?;

        if let Some(isbn) = book.isbn.as_deref() {
            if self.books.find_by_isbn(isbn).await?.is_some() {
                warn!(isbn, "Duplicate ISBN rejected");
                return Err(duplicate_isbn(isbn).into());
            }
        }

        let book = self.books.insert(book).await?;
        info!(book_id = book.id, "Book registered");
        Ok(book)
    }

    #[instrument(level = "info", skip(self, update))]
    pub async fn update(&self, id: BookId, update: BookUpdate) -> Result<Book> {
        let update = update.normalized();
        update.validate()?;

        if let Some(isbn) = update.isbn.as_deref() {
            if let Some(other) = self.books.find_by_isbn(isbn).await? {
                if other.id != id {
                    warn!(isbn, owner = other.id, "ISBN already used by another book");
                    return Err(duplicate_isbn(isbn).into());
                }
            }
        }

        let book = self.books.update(id, update).await?;
        info!("Book updated");
        Ok(book)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn remove(&self, id: BookId) -> Result<()> {
        self.books.delete(id).await?;
        info!("Book removed");
        Ok(())
    }

    pub async fn get(&self, id: BookId) -> Result<Book> {
        self.books
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id).into())
    }

    pub async fn list(&self) -> Result<Vec<Book>> {
        Ok(self.books.list_all().await?)
    }

    /// Genre labels in use, ascending.
    pub async fn genres(&self) -> Result<Vec<String>> {
        Ok(self.books.list_genres().await?)
    }

    /// Books whose genre is exactly one of `genres`. Labels are trimmed and
    /// blank ones ignored.
    pub async fn in_genres(&self, genres: &[String]) -> Result<Vec<Book>> {
        let labels: Vec<String> = genres
            .iter()
            .map(|genre| genre.trim())
            .filter(|genre| !genre.is_empty())
            .map(str::to_string)
            .collect();
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.books.find_by_genres(&labels).await?)
    }

    /// Books matching every supplied criterion.
    #[instrument(level = "debug", skip(self))]
    pub async fn search(&self, criteria: &FilterCriteria, sort: SortOrder) -> Result<Vec<Book>> {
        let query = build_filter(criteria)?;
        let mut books = self.books.find_by_criteria(&query).await?;

        if sort == SortOrder::Title {
            books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        }

        debug!(matches = books.len(), "Search completed");
        Ok(books)
    }

    /// Catalog a book from external metadata, unless its ISBN is already
    /// cataloged.
    #[instrument(level = "info", skip(self, source), fields(source = source.source_name()))]
    pub async fn register_by_isbn(
        &self,
        isbn: &str,
        source: &dyn BookMetadataSource,
    ) -> Result<ImportOutcome> {
        let isbn = isbn.trim();
        validate_isbn(isbn)?;

        if let Some(existing) = self.books.find_by_isbn(isbn).await? {
            debug!(book_id = existing.id, "ISBN already cataloged");
            return Ok(ImportOutcome::Existing(existing));
        }

        let metadata = source
            .lookup_isbn(isbn)
            .await?
            .ok_or_else(|| LookupError::NotFound(isbn.to_string()))?;

        let book = self.register(NewBook::from(metadata)).await?;
        Ok(ImportOutcome::Created(book))
    }

    /// Books linked to `id` in the similarity graph.
    pub async fn similar_to(&self, id: BookId, edges: &dyn SimilarityStore) -> Result<Vec<Book>> {
        // NotFound for an unknown book instead of an empty list
        self.get(id).await?;

        let mut similar = Vec::new();
        for other in edges.neighbors(id).await? {
            if let Some(book) = self.books.find_by_id(other).await? {
                similar.push(book);
            }
        }
        Ok(similar)
    }
}

fn duplicate_isbn(isbn: &str) -> StoreError {
    StoreError::Conflict(format!("a book with ISBN {isbn} already exists"))
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService").finish_non_exhaustive()
    }
}
