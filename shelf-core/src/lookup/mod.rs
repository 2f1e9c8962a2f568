//! ISBN metadata lookup.
//!
//! Registering a book by ISBN asks an external catalog for its metadata:
//!
//! - **Open Library** (`OpenLibraryClient`, feature `network`) - public search API
//! - **Static** (`StaticMetadataSource`) - fixed records, for tests and offline use

#[cfg(feature = "network")]
mod openlibrary;
mod fixed;

#[cfg(feature = "network")]
pub use openlibrary::{OpenLibraryClient, OpenLibraryConfig};
pub use fixed::StaticMetadataSource;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::book::NewBook;
use crate::error::LookupError;

/// Descriptive fields returned by a metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
    pub published_on: Option<NaiveDate>,
}

impl From<BookMetadata> for NewBook {
    fn from(meta: BookMetadata) -> Self {
        NewBook {
            title: meta.title,
            author: meta.author,
            publisher: meta.publisher,
            genre: meta.genre,
            isbn: Some(meta.isbn),
            published_on: meta.published_on,
        }
    }
}

/// External service resolving an ISBN to book metadata.
#[async_trait]
pub trait BookMetadataSource: Send + Sync {
    /// `Ok(None)` when the service knows no book with this ISBN.
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<BookMetadata>, LookupError>;

    /// Short name for logs.
    fn source_name(&self) -> &'static str;
}
