//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod books;
pub mod genres;
pub mod health;
pub mod similarities;

pub use crate::state::AppState;
pub use books::{
    create_book, delete_book, get_book, import_book, list_books, similar_books, update_book,
    BookListResponse, BookQuery, BookRequest, BookResponse, ImportRequest, ImportResponse,
    SimilarBooksResponse,
};
pub use genres::{books_in_genres, list_genres, GenreBooksQuery, GenreListResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use similarities::{recompute_status, start_recompute, RecomputeQuery};
