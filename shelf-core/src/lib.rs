//! Shelf Core - book catalog library
//!
//! This crate holds the catalog domain: book records, safe dynamic search
//! filters, and the genre similarity graph that links books sharing a genre.
//!
//! # Features
//!
//! - Parameterized filter composition over any subset of search criteria
//! - Transactional, idempotent recompute of symmetric similarity edges
//! - PostgreSQL storage via sqlx (feature `postgres`) or in-memory storage
//! - ISBN metadata import from Open Library (feature `network`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use shelf_core::{CatalogService, NewBook, SimilarityGraphBuilder};
//! use shelf_core::store::{MemoryBookStore, MemorySimilarityStore};
//!
//! # async fn example() -> shelf_core::Result<()> {
//! let edges = Arc::new(MemorySimilarityStore::new());
//! let books = Arc::new(MemoryBookStore::linked_to(edges.clone()));
//! let catalog = CatalogService::new(books.clone());
//!
//! for title in ["The Hobbit", "Earthsea"] {
//!     catalog
//!         .register(NewBook {
//!             title: title.into(),
//!             author: "Someone".into(),
//!             publisher: "Someone Else".into(),
//!             genre: "Fantasy".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//! }
//!
//! let report = SimilarityGraphBuilder::new(books, edges).recompute().await?;
//! assert_eq!(report.edges_inserted, 1);
//! # Ok(())
//! # }
//! ```

pub mod book;
pub mod catalog;
pub mod error;
pub mod filter;
pub mod lookup;
pub mod similarity;
pub mod store;

// Re-export main types for convenience
pub use book::{Book, BookId, BookUpdate, NewBook, ISBN_LEN};
pub use catalog::{CatalogService, ImportOutcome, SortOrder};
pub use error::{
    CatalogError, LookupError, RecomputeError, RecomputePhase, Result, StoreError,
    ValidationError,
};
pub use filter::{build_filter, FilterCriteria, FilterQuery};
pub use lookup::{BookMetadata, BookMetadataSource, StaticMetadataSource};
pub use similarity::{RecomputeOptions, RecomputeReport, SimilarityGraphBuilder};

#[cfg(feature = "network")]
pub use lookup::{OpenLibraryClient, OpenLibraryConfig};
