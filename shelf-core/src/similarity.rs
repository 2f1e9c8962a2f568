//! Genre similarity graph maintenance.
//!
//! A recompute pass walks the whole catalog and links every pair of books
//! that share a genre label (exact, case- and whitespace-sensitive equality).
//! All writes of a pass go through a single [`SimilarityTx`]: the pass either
//! commits every missing edge at once or leaves the graph untouched. Existing
//! rows are never removed, so a second pass over an unchanged catalog writes
//! nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::book::BookId;
use crate::error::{RecomputeError, RecomputePhase};
use crate::store::{BookStore, SimilarityStore, SimilarityTx};

/// Default number of genre-group reads in flight.
pub const DEFAULT_READ_CONCURRENCY: usize = 4;

/// Tuning for a recompute pass.
#[derive(Debug, Clone)]
pub struct RecomputeOptions {
    /// Genre-group reads issued concurrently. Writes stay serialized.
    pub read_concurrency: usize,
}

impl Default for RecomputeOptions {
    fn default() -> Self {
        Self {
            read_concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }
}

/// Outcome of a committed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    pub books_scanned: usize,
    /// (book, same-genre book) pairs checked against the store
    pub pairs_examined: usize,
    /// Undirected edges added; each is two stored rows
    pub edges_inserted: usize,
    pub elapsed_ms: u64,
}

/// Recomputes the similarity graph for the entire catalog.
pub struct SimilarityGraphBuilder {
    books: Arc<dyn BookStore>,
    edges: Arc<dyn SimilarityStore>,
    options: RecomputeOptions,
    /// Held for the duration of a pass.
    running: Mutex<()>,
}

impl SimilarityGraphBuilder {
    pub fn new(books: Arc<dyn BookStore>, edges: Arc<dyn SimilarityStore>) -> Self {
        Self::with_options(books, edges, RecomputeOptions::default())
    }

    pub fn with_options(
        books: Arc<dyn BookStore>,
        edges: Arc<dyn SimilarityStore>,
        options: RecomputeOptions,
    ) -> Self {
        Self {
            books,
            edges,
            options,
            running: Mutex::new(()),
        }
    }

    /// Whether a pass currently holds the lock.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Run a pass, waiting for any pass already in progress to finish.
    pub async fn recompute(&self) -> Result<RecomputeReport, RecomputeError> {
        let _running = self.running.lock().await;
        self.run_pass().await
    }

    /// Run a pass, failing with [`RecomputeError::AlreadyRunning`] instead of
    /// waiting.
    pub async fn try_recompute(&self) -> Result<RecomputeReport, RecomputeError> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| RecomputeError::AlreadyRunning)?;
        self.run_pass().await
    }

    /// Run a pass bounded by `limit`, lock wait included.
    ///
    /// On expiry the pass future is dropped, which drops the open
    /// transaction uncommitted, so nothing from it persists.
    pub async fn recompute_with_timeout(
        &self,
        limit: Duration,
    ) -> Result<RecomputeReport, RecomputeError> {
        match tokio::time::timeout(limit, self.recompute()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(limit_ms = limit.as_millis() as u64, "Similarity recompute timed out");
                Err(RecomputeError::TimedOut(limit))
            }
        }
    }

    #[instrument(level = "info", skip(self), fields(read_concurrency = self.options.read_concurrency))]
    async fn run_pass(&self) -> Result<RecomputeReport, RecomputeError> {
        let started = Instant::now();
        info!("Similarity recompute started");

        let mut tx = self
            .edges
            .begin_recompute()
            .await
            .map_err(RecomputeError::at(RecomputePhase::Transaction))?;

        let mut report = match self.reconcile(tx.as_mut()).await {
            Ok(report) => report,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed; transaction discarded on drop");
                }
                error!(
                    phase = ?err.phase(),
                    error = %err,
                    "Similarity recompute failed, rolled back"
                );
                return Err(err);
            }
        };

        tx.commit()
            .await
            .map_err(RecomputeError::at(RecomputePhase::Transaction))
            .inspect_err(|err| error!(error = %err, "Similarity commit failed"))?;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            books_scanned = report.books_scanned,
            pairs_examined = report.pairs_examined,
            edges_inserted = report.edges_inserted,
            elapsed_ms = report.elapsed_ms,
            "Similarity recompute committed"
        );
        Ok(report)
    }

    /// Insert every missing same-genre edge through `tx`.
    async fn reconcile(&self, tx: &mut dyn SimilarityTx) -> Result<RecomputeReport, RecomputeError> {
        let catalog = self
            .books
            .list_all()
            .await
            .map_err(RecomputeError::at(RecomputePhase::CatalogRead))?;

        let mut report = RecomputeReport {
            books_scanned: catalog.len(),
            ..Default::default()
        };

        let keys: Vec<(BookId, String)> = catalog
            .into_iter()
            .map(|book| (book.id, book.genre))
            .collect();

        // Reads run ahead; results still arrive in catalog order
        let mut groups = stream::iter(keys)
            .map(|(id, genre)| {
                let books = Arc::clone(&self.books);
                async move {
                    books
                        .find_by_genre_excluding(&genre, id)
                        .await
                        .map(|group| (id, group))
                }
            })
            .buffered(self.options.read_concurrency.max(1));

        while let Some(group) = groups.next().await {
            let (id, group) = group.map_err(RecomputeError::at(RecomputePhase::GenreGroupRead))?;

            for other in group {
                report.pairs_examined += 1;

                let exists = tx
                    .exists(id, other.id)
                    .await
                    .map_err(RecomputeError::at(RecomputePhase::EdgeWrite))?;
                if exists {
                    continue;
                }

                let inserted = tx
                    .insert_pair(id, other.id)
                    .await
                    .map_err(RecomputeError::at(RecomputePhase::EdgeWrite))?;
                if inserted {
                    debug!(book_id = id, similar_id = other.id, "Similarity edge staged");
                    report.edges_inserted += 1;
                }
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for SimilarityGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityGraphBuilder")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish()
    }
}
