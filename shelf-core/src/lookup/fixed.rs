//! Metadata source backed by a fixed table.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{BookMetadata, BookMetadataSource};
use crate::error::LookupError;

/// Serves a fixed set of records keyed by ISBN.
#[derive(Debug, Default, Clone)]
pub struct StaticMetadataSource {
    records: HashMap<String, BookMetadata>,
}

impl StaticMetadataSource {
    pub fn new(records: impl IntoIterator<Item = BookMetadata>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.isbn.clone(), record))
                .collect(),
        }
    }
}

#[async_trait]
impl BookMetadataSource for StaticMetadataSource {
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<BookMetadata>, LookupError> {
        Ok(self.records.get(isbn).cloned())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}
