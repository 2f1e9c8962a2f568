//! Open Library metadata client.
//!
//! Uses the public search API at https://openlibrary.org/search.json
//!
//! ## Features
//!
//! - Automatic retry with exponential backoff on transient errors
//! - Configurable API endpoint and timeout
//! - Tracing instrumentation with request latency

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{BookMetadata, BookMetadataSource};
use crate::error::LookupError;

/// Default Open Library base URL.
const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of retry attempts.
const MAX_RETRIES: u32 = 3;

const INITIAL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Response of `/search.json`.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchDoc {
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    subject: Vec<String>,
    first_publish_year: Option<i32>,
}

/// Configuration for the Open Library client.
#[derive(Debug, Clone)]
pub struct OpenLibraryConfig {
    /// Base URL; `/search.json` is appended.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENLIBRARY_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
        }
    }
}

/// Open Library client.
///
/// ## Example
///
/// ```no_run
/// use shelf_core::lookup::{BookMetadataSource, OpenLibraryClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OpenLibraryClient::new()?;
/// if let Some(meta) = client.lookup_isbn("9780441013593").await? {
///     println!("{} by {}", meta.title, meta.author);
/// }
/// # Ok(())
/// # }
/// ```
pub struct OpenLibraryClient {
    client: Client,
    config: OpenLibraryConfig,
}

impl OpenLibraryClient {
    /// Create a client with default settings.
    pub fn new() -> Result<Self, LookupError> {
        Self::with_config(OpenLibraryConfig::default())
    }

    /// Create a client with custom configuration.
    #[instrument(level = "debug", skip_all, fields(
        base_url = %config.base_url,
        timeout_ms = config.timeout.as_millis() as u64,
        max_retries = config.max_retries
    ))]
    pub fn with_config(config: OpenLibraryConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                LookupError::Service(format!("Failed to create HTTP client: {e}"))
            })?;

        debug!("Open Library client created");
        Ok(Self { client, config })
    }

    fn search_url(&self) -> String {
        format!("{}/search.json", self.config.base_url.trim_end_matches('/'))
    }

    /// Map the first search hit to catalog metadata.
    fn to_metadata(isbn: &str, response: SearchResponse) -> Option<BookMetadata> {
        let doc = response.docs.into_iter().next()?;
        let first = |values: Vec<String>| values.into_iter().next().unwrap_or_default();

        Some(BookMetadata {
            isbn: isbn.to_string(),
            title: doc.title.unwrap_or_default(),
            author: first(doc.author_name),
            publisher: first(doc.publisher),
            genre: first(doc.subject),
            published_on: doc
                .first_publish_year
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        })
    }

    fn is_transient_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    fn is_transient_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }

    /// One search attempt.
    async fn search_once(
        &self,
        isbn: &str,
    ) -> Result<Option<BookMetadata>, backoff::Error<LookupError>> {
        let start = Instant::now();

        let response = self
            .client
            .get(self.search_url())
            .query(&[("isbn", isbn)])
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                if Self::is_transient_error(&e) {
                    warn!(error = %e, latency_ms, "Transient error, will retry");
                    backoff::Error::transient(LookupError::Http(e))
                } else {
                    warn!(error = %e, latency_ms, "Permanent error, aborting");
                    backoff::Error::permanent(LookupError::Http(e))
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let err = LookupError::Service(format!("Open Library returned status: {status}"));
            return if Self::is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse search response");
            backoff::Error::permanent(LookupError::Service(format!(
                "Failed to parse Open Library response: {e}"
            )))
        })?;

        debug!(
            hits = body.docs.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(Self::to_metadata(isbn, body))
    }
}

#[async_trait]
impl BookMetadataSource for OpenLibraryClient {
    #[instrument(level = "info", skip(self), fields(source = "openlibrary"))]
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<BookMetadata>, LookupError> {
        let start = Instant::now();

        let result = retry_notify(
            self.build_backoff(),
            || async { self.search_once(isbn).await },
            |err: LookupError, after: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = after.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await;

        let total_latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(Some(meta)) => info!(total_latency_ms, title = %meta.title, "ISBN resolved"),
            Ok(None) => info!(total_latency_ms, "ISBN unknown to Open Library"),
            Err(e) => warn!(error = %e, total_latency_ms, "ISBN lookup failed after all retries"),
        }

        result
    }

    fn source_name(&self) -> &'static str {
        "openlibrary"
    }
}

impl std::fmt::Debug for OpenLibraryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenLibraryClient")
            .field("config", &self.config)
            .finish()
    }
}
