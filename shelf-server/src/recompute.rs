//! Background similarity recompute jobs
//!
//! A pass runs on its own task so that neither a slow catalog nor a dropped
//! HTTP connection interrupts it. The tracker keeps the outcome of the last
//! pass for status queries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_core::{RecomputeError, RecomputeReport, SimilarityGraphBuilder};
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinHandle};
use utoipa::ToSchema;

/// Counters of a committed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecomputeSummary {
    /// Books read from the catalog
    #[schema(example = 120)]
    pub books_scanned: usize,
    /// Same-genre pairs checked
    #[schema(example = 480)]
    pub pairs_examined: usize,
    /// Undirected edges added
    #[schema(example = 12)]
    pub edges_inserted: usize,
    /// Wall time of the pass
    #[schema(example = 35)]
    pub elapsed_ms: u64,
}

impl From<RecomputeReport> for RecomputeSummary {
    fn from(report: RecomputeReport) -> Self {
        Self {
            books_scanned: report.books_scanned,
            pairs_examined: report.pairs_examined,
            edges_inserted: report.edges_inserted,
            elapsed_ms: report.elapsed_ms,
        }
    }
}

/// State of the most recent recompute pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecomputeStatus {
    /// No pass has run since startup
    Idle,
    Running {
        started_at: DateTime<Utc>,
    },
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        report: RecomputeSummary,
    },
    /// The pass was rolled back; the graph is as it was before it started
    Failed {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
        error: String,
    },
}

impl RecomputeStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Tracks the single recompute pass a server runs at a time.
#[derive(Debug)]
pub struct RecomputeTracker {
    status: RwLock<RecomputeStatus>,
}

impl Default for RecomputeTracker {
    fn default() -> Self {
        Self {
            status: RwLock::new(RecomputeStatus::Idle),
        }
    }
}

impl RecomputeTracker {
    pub async fn current(&self) -> RecomputeStatus {
        self.status.read().await.clone()
    }

    /// Mark a pass as running, or return `None` if one already is.
    async fn try_begin(&self) -> Option<DateTime<Utc>> {
        let mut status = self.status.write().await;
        if status.is_running() {
            return None;
        }
        let started_at = Utc::now();
        *status = RecomputeStatus::Running { started_at };
        Some(started_at)
    }

    async fn finish(
        &self,
        started_at: DateTime<Utc>,
        result: &Result<RecomputeReport, RecomputeError>,
    ) {
        let finished_at = Utc::now();
        *self.status.write().await = match result {
            Ok(report) => RecomputeStatus::Succeeded {
                started_at,
                finished_at,
                report: report.clone().into(),
            },
            Err(e) => RecomputeStatus::Failed {
                started_at,
                finished_at,
                phase: e.phase().map(|phase| phase.to_string()),
                error: e.to_string(),
            },
        };
    }

    /// Record a pass whose task panicked or was cancelled.
    async fn abort(&self, started_at: DateTime<Utc>, error: &JoinError) {
        *self.status.write().await = RecomputeStatus::Failed {
            started_at,
            finished_at: Utc::now(),
            phase: None,
            error: format!("Similarity recompute task ended abnormally: {error}"),
        };
    }

    /// Spawn a pass on `graph` bounded by `limit`.
    ///
    /// Fails with [`RecomputeError::AlreadyRunning`] while an earlier pass
    /// started through this tracker is still in progress.
    pub async fn spawn(
        self: &Arc<Self>,
        graph: Arc<SimilarityGraphBuilder>,
        limit: Duration,
    ) -> Result<JoinHandle<Result<RecomputeReport, RecomputeError>>, RecomputeError> {
        self.run(async move { graph.recompute_with_timeout(limit).await })
            .await
    }

    /// Run `pass` on its own task and record its outcome.
    ///
    /// The status leaves `Running` however the task ends. A panic or
    /// cancellation is recorded as a failure, then resumed on the returned
    /// handle.
    async fn run<F>(
        self: &Arc<Self>,
        pass: F,
    ) -> Result<JoinHandle<Result<RecomputeReport, RecomputeError>>, RecomputeError>
    where
        F: Future<Output = Result<RecomputeReport, RecomputeError>> + Send + 'static,
    {
        let started_at = self
            .try_begin()
            .await
            .ok_or(RecomputeError::AlreadyRunning)?;

        let tracker = Arc::clone(self);
        let pass = tokio::spawn(pass);
        Ok(tokio::spawn(async move {
            match pass.await {
                Ok(result) => {
                    tracker.finish(started_at, &result).await;
                    result
                }
                Err(e) => {
                    tracing::error!(error = %e, "Similarity recompute task ended abnormally");
                    tracker.abort(started_at, &e).await;
                    std::panic::resume_unwind(match e.try_into_panic() {
                        Ok(payload) => payload,
                        Err(e) => Box::new(e.to_string()) as Box<dyn std::any::Any + Send>,
                    })
                }
            }
        }))
    }
}
