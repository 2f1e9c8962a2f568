//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use shelf_core::store::{
    self, BookStore, MemoryBookStore, MemorySimilarityStore, SimilarityStore,
};
use shelf_core::{
    BookMetadataSource, CatalogService, OpenLibraryClient, OpenLibraryConfig, RecomputeOptions,
    SimilarityGraphBuilder, StaticMetadataSource, StoreError,
};

use crate::config::Config;
use crate::recompute::RecomputeTracker;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Book registration and search
    pub catalog: CatalogService,
    /// Similarity edges, read by the "similar books" endpoint
    pub similarity: Arc<dyn SimilarityStore>,
    /// Recompute engine over the same stores
    pub graph: Arc<SimilarityGraphBuilder>,
    /// ISBN metadata source for imports
    pub metadata: Arc<dyn BookMetadataSource>,
    /// Status of background recompute passes
    pub recompute: Arc<RecomputeTracker>,
    /// Upper bound for one recompute pass
    pub recompute_timeout: Duration,
    /// Storage backend name, reported by /health
    pub backend: &'static str,
}

impl AppState {
    /// Wire state over the given stores.
    pub fn new(
        books: Arc<dyn BookStore>,
        similarity: Arc<dyn SimilarityStore>,
        metadata: Arc<dyn BookMetadataSource>,
        config: &Config,
        backend: &'static str,
    ) -> Self {
        let graph = SimilarityGraphBuilder::with_options(
            Arc::clone(&books),
            Arc::clone(&similarity),
            RecomputeOptions {
                read_concurrency: config.recompute_read_concurrency,
            },
        );

        Self {
            catalog: CatalogService::new(books),
            similarity,
            graph: Arc::new(graph),
            metadata,
            recompute: Arc::new(RecomputeTracker::default()),
            recompute_timeout: Duration::from_secs(config.recompute_timeout_secs),
            backend,
        }
    }

    /// Process-local state with no metadata records (for testing and dev).
    pub fn in_memory(config: &Config) -> Self {
        let similarity = Arc::new(MemorySimilarityStore::new());
        let books = Arc::new(MemoryBookStore::linked_to(Arc::clone(&similarity)));
        Self::new(
            books,
            similarity,
            Arc::new(StaticMetadataSource::default()),
            config,
            "memory",
        )
    }

    /// Build state from configuration.
    ///
    /// Uses PostgreSQL when `DATABASE_URL` is set, applying migrations first;
    /// otherwise falls back to in-memory storage. Imports resolve ISBNs
    /// through Open Library.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let state = match &config.database_url {
            Some(url) => {
                let pool = store::connect(
                    url,
                    config.database_max_connections,
                    config.database_min_connections,
                )
                .await?;
                store::migrate(&pool).await?;

                Self::new(
                    Arc::new(store::PgBookStore::new(pool.clone())),
                    Arc::new(store::PgSimilarityStore::new(pool)),
                    Arc::new(StaticMetadataSource::default()),
                    config,
                    "postgres",
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on exit)");
                Self::in_memory(config)
            }
        };

        let lookup = OpenLibraryClient::with_config(OpenLibraryConfig {
            base_url: config.openlibrary_url.clone(),
            ..Default::default()
        });
        Ok(match lookup {
            Ok(client) => state.with_metadata(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Open Library client unavailable, ISBN import disabled");
                state
            }
        })
    }

    /// Replace the metadata source used by imports.
    pub fn with_metadata(mut self, metadata: Arc<dyn BookMetadataSource>) -> Self {
        self.metadata = metadata;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend)
            .field("metadata", &self.metadata.source_name())
            .field("recompute_timeout", &self.recompute_timeout)
            .finish_non_exhaustive()
    }
}
