//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the Shelf catalog API, served at
//! `/api-docs/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use crate::handlers::{
    BookListResponse, BookRequest, BookResponse, GenreListResponse, HealthResponse, ImportRequest,
    ImportResponse, ReadyResponse, SimilarBooksResponse,
};
use crate::recompute::{RecomputeStatus, RecomputeSummary};

/// Shelf Catalog API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelf - Book Catalog API",
        version = "0.1.0",
        description = r#"
## Book catalog with genre similarity

- **Search** books by any combination of id, title, author, genre, ISBN and
  publication date. Every value is bound as a query parameter.
- **Import** books by ISBN from Open Library.
- **Recompute** the similarity graph: books with exactly the same genre are
  linked both ways, in a single all-or-nothing pass.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Books", description = "Catalog search and maintenance"),
        (name = "Genres", description = "Genre labels and the books filed under them"),
        (name = "Similarities", description = "Genre similarity graph"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::books::list_books,
        crate::handlers::books::create_book,
        crate::handlers::books::import_book,
        crate::handlers::books::get_book,
        crate::handlers::books::update_book,
        crate::handlers::books::delete_book,
        crate::handlers::books::similar_books,
        crate::handlers::genres::list_genres,
        crate::handlers::genres::books_in_genres,
        crate::handlers::similarities::start_recompute,
        crate::handlers::similarities::recompute_status,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            BookResponse,
            BookRequest,
            BookListResponse,
            ImportRequest,
            ImportResponse,
            SimilarBooksResponse,
            GenreListResponse,
            RecomputeStatus,
            RecomputeSummary,
        )
    )
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
