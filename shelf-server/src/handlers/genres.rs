//! Genre handlers
//!
//! Genres are the free-text labels carried by books; these endpoints list
//! the labels in use and the books filed under them.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::handlers::{AppState, BookListResponse};

/// Genre labels in use
#[derive(Debug, Serialize, ToSchema)]
pub struct GenreListResponse {
    #[schema(example = 2)]
    pub count: usize,
    #[schema(example = json!(["Fantasy", "Science Fiction"]))]
    pub genres: Vec<String>,
}

/// Genres to list books for
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct GenreBooksQuery {
    /// Comma-separated labels, matched exactly after trimming
    #[param(example = "Fantasy,Science Fiction")]
    pub names: Option<String>,
}

impl GenreBooksQuery {
    fn labels(&self) -> Result<Vec<String>, ApiError> {
        let labels: Vec<String> = self
            .names
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();
        if labels.is_empty() {
            return Err(ApiError::bad_request("at least one genre name is required"));
        }
        Ok(labels)
    }
}

/// List genre labels
///
/// Distinct non-empty labels, in ascending order.
#[utoipa::path(
    get,
    path = "/api/v1/genres",
    tag = "Genres",
    responses(
        (status = 200, description = "Genre labels", body = GenreListResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_genres(
    State(state): State<AppState>,
) -> Result<Json<GenreListResponse>, ApiError> {
    let genres = state.catalog.genres().await?;
    Ok(Json(GenreListResponse {
        count: genres.len(),
        genres,
    }))
}

/// List books in any of the given genres
#[utoipa::path(
    get,
    path = "/api/v1/genres/books",
    tag = "Genres",
    params(GenreBooksQuery),
    responses(
        (status = 200, description = "Books in the genres", body = BookListResponse),
        (status = 400, description = "No genre given")
    )
)]
pub async fn books_in_genres(
    State(state): State<AppState>,
    Query(query): Query<GenreBooksQuery>,
) -> Result<Json<BookListResponse>, ApiError> {
    let labels = query.labels()?;
    let books = state.catalog.in_genres(&labels).await?;
    tracing::debug!(genres = labels.len(), matches = books.len(), "Genre listing");
    Ok(Json(books.into()))
}
