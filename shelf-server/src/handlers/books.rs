//! Book catalog handlers
//!
//! Search, registration, ISBN import, maintenance and similar-book lookup.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shelf_core::{Book, BookId, FilterCriteria, NewBook, SortOrder};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::handlers::AppState;

/// A cataloged book
#[derive(Debug, Serialize, ToSchema)]
pub struct BookResponse {
    #[schema(example = 1)]
    pub id: BookId,
    #[schema(example = "Dune")]
    pub title: String,
    #[schema(example = "Frank Herbert")]
    pub author: String,
    #[schema(example = "Chilton Books")]
    pub publisher: String,
    #[schema(example = "Science Fiction")]
    pub genre: String,
    /// 13-character ISBN
    #[schema(example = "9780441172719")]
    pub isbn: Option<String>,
    pub published_on: Option<NaiveDate>,
    /// Date the book entered the catalog
    pub included_on: NaiveDate,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            publisher: book.publisher,
            genre: book.genre,
            isbn: book.isbn,
            published_on: book.published_on,
            included_on: book.included_on,
        }
    }
}

/// Book payload for create and replace
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookRequest {
    #[schema(example = "Dune")]
    pub title: String,
    #[schema(example = "Frank Herbert")]
    pub author: String,
    #[schema(example = "Chilton Books")]
    pub publisher: String,
    /// Free-text label; books with exactly the same label are similar
    #[serde(default)]
    #[schema(example = "Science Fiction")]
    pub genre: String,
    #[serde(default)]
    #[schema(example = "9780441172719")]
    pub isbn: Option<String>,
    #[serde(default)]
    pub published_on: Option<NaiveDate>,
}

impl From<BookRequest> for NewBook {
    fn from(request: BookRequest) -> Self {
        Self {
            title: request.title,
            author: request.author,
            publisher: request.publisher,
            genre: request.genre,
            isbn: request.isbn,
            published_on: request.published_on,
        }
    }
}

/// Search parameters; every field is optional and absent fields match all
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Substring of the decimal identifier
    pub id: Option<String>,
    /// Case-insensitive title substring
    pub title: Option<String>,
    /// Case-insensitive author substring
    pub author: Option<String>,
    /// Case-insensitive genre substring
    pub genre: Option<String>,
    /// Case-insensitive ISBN substring
    pub isbn: Option<String>,
    /// Exact publication date, YYYY-MM-DD or DD/MM/YYYY
    pub published_on: Option<String>,
    /// "title" to sort by title
    pub sort: Option<String>,
}

impl BookQuery {
    fn into_parts(self) -> Result<(FilterCriteria, SortOrder), ApiError> {
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortOrder::Unsorted,
            Some(s) if s.eq_ignore_ascii_case("title") => SortOrder::Title,
            Some(other) => {
                return Err(ApiError::bad_request(format!(
                    "unsupported sort '{other}', expected 'title'"
                )))
            }
        };

        let criteria = FilterCriteria {
            id: self.id,
            title: self.title,
            author: self.author,
            genre: self.genre,
            isbn: self.isbn,
            published_on: self.published_on,
        };
        Ok((criteria, sort))
    }
}

/// Search result
#[derive(Debug, Serialize, ToSchema)]
pub struct BookListResponse {
    #[schema(example = 2)]
    pub count: usize,
    pub books: Vec<BookResponse>,
}

impl From<Vec<Book>> for BookListResponse {
    fn from(books: Vec<Book>) -> Self {
        Self {
            count: books.len(),
            books: books.into_iter().map(BookResponse::from).collect(),
        }
    }
}

/// Import request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportRequest {
    #[schema(example = "9780441172719")]
    pub isbn: String,
}

/// Import result
#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    /// False when the ISBN was already cataloged
    pub created: bool,
    pub book: BookResponse,
}

/// Books linked to a book in the similarity graph
#[derive(Debug, Serialize, ToSchema)]
pub struct SimilarBooksResponse {
    pub book_id: BookId,
    pub count: usize,
    pub books: Vec<BookResponse>,
}

/// Search the catalog
///
/// Combines every supplied criterion with AND. Text criteria match
/// case-insensitive substrings; `%` and `_` are literal characters.
#[utoipa::path(
    get,
    path = "/api/v1/books",
    tag = "Books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books", body = BookListResponse),
        (status = 400, description = "Unparseable date or unsupported sort")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookListResponse>, ApiError> {
    let (criteria, sort) = query.into_parts()?;
    let books = state.catalog.search(&criteria, sort).await?;
    Ok(Json(books.into()))
}

/// Register a book
#[utoipa::path(
    post,
    path = "/api/v1/books",
    tag = "Books",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book registered", body = BookResponse),
        (status = 400, description = "Missing field or malformed ISBN"),
        (status = 409, description = "ISBN already cataloged")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let book = state.catalog.register(request.into()).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// Register a book from its ISBN
///
/// Looks the ISBN up in the configured metadata service. An ISBN that is
/// already cataloged returns the existing book with `created = false`.
#[utoipa::path(
    post,
    path = "/api/v1/books/import",
    tag = "Books",
    request_body = ImportRequest,
    responses(
        (status = 201, description = "Book imported", body = ImportResponse),
        (status = 200, description = "ISBN already cataloged", body = ImportResponse),
        (status = 400, description = "Malformed ISBN"),
        (status = 404, description = "ISBN unknown to the metadata service"),
        (status = 503, description = "Metadata service unavailable")
    )
)]
pub async fn import_book(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let outcome = state
        .catalog
        .register_by_isbn(&request.isbn, state.metadata.as_ref())
        .await?;

    let created = outcome.is_created();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ImportResponse {
            created,
            book: outcome.into_book().into(),
        }),
    ))
}

/// Get a book
#[utoipa::path(
    get,
    path = "/api/v1/books/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book identifier")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<BookId>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.catalog.get(id).await?;
    Ok(Json(book.into()))
}

/// Replace a book's fields
///
/// Similarity edges are not revisited until the next recompute pass.
#[utoipa::path(
    put,
    path = "/api/v1/books/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book identifier")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Updated book", body = BookResponse),
        (status = 400, description = "Missing field or malformed ISBN"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN belongs to another book")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<BookId>,
    Json(request): Json<BookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.catalog.update(id, request.into()).await?;
    Ok(Json(book.into()))
}

/// Remove a book and its similarity edges
#[utoipa::path(
    delete,
    path = "/api/v1/books/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book identifier")),
    responses(
        (status = 204, description = "Book removed"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<BookId>,
) -> Result<StatusCode, ApiError> {
    state.catalog.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List books similar to a book
///
/// Reflects the graph as of the last committed recompute pass.
#[utoipa::path(
    get,
    path = "/api/v1/books/{id}/similar",
    tag = "Books",
    params(("id" = i64, Path, description = "Book identifier")),
    responses(
        (status = 200, description = "Similar books", body = SimilarBooksResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn similar_books(
    State(state): State<AppState>,
    Path(id): Path<BookId>,
) -> Result<Json<SimilarBooksResponse>, ApiError> {
    let books = state
        .catalog
        .similar_to(id, state.similarity.as_ref())
        .await?;

    Ok(Json(SimilarBooksResponse {
        book_id: id,
        count: books.len(),
        books: books.into_iter().map(BookResponse::from).collect(),
    }))
}
