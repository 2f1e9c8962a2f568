//! API integration tests for shelf-server.
//!
//! These tests drive the full router over in-memory storage, covering
//! catalog maintenance, search, ISBN import and similarity recompute.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use shelf_core::store::{MemoryBookStore, MemorySimilarityStore, SimilarityStore, SimilarityTx};
use shelf_core::{BookMetadata, StaticMetadataSource};
use shelf_server::{create_router, create_router_with_state, AppState, Config};
use tower::ServiceExt;

/// Build the test router using the library's create_router function
fn create_test_app() -> Router {
    create_router()
}

/// Send a request and decode the JSON body (Null when empty)
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn book(title: &str, genre: &str, isbn: Option<&str>) -> Value {
    json!({
        "title": title,
        "author": "Author",
        "publisher": "Publisher",
        "genre": genre,
        "isbn": isbn,
    })
}

async fn create(app: &Router, title: &str, genre: &str) -> i64 {
    let (status, body) = send(app, "POST", "/api/v1/books", Some(book(title, genre, None))).await;
    assert_eq!(status, StatusCode::CREATED, "create {title}: {body}");
    body["id"].as_i64().unwrap()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["backend"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/books"].is_object());
    assert!(json["paths"]["/api/v1/similarities/recompute"].is_object());
    assert!(json["paths"]["/api/v1/genres"].is_object());
}

// ============================================================================
// Book Maintenance Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_get_book() {
    let app = create_test_app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(book("  Dune ", "Science Fiction", Some("9780441172719"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Dune");
    assert!(created["included_on"].is_string());

    let uri = format!("/api/v1/books/{}", created["id"]);
    let (status, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_rejects_bad_isbn() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(book("Dune", "Science Fiction", Some("12345"))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
    assert_eq!(json["field"], "isbn");
}

#[tokio::test]
async fn test_duplicate_isbn_conflicts() {
    let app = create_test_app();
    let payload = book("Dune", "Science Fiction", Some("9780441172719"));

    send(&app, "POST", "/api/v1/books", Some(payload.clone())).await;
    let (status, json) = send(&app, "POST", "/api/v1/books", Some(payload)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "DUPLICATE_ISBN");
}

#[tokio::test]
async fn test_update_and_delete_book() {
    let app = create_test_app();
    let id = create(&app, "Dune", "Science Fiction").await;
    let uri = format!("/api/v1/books/{id}");

    let (status, updated) = send(
        &app,
        "PUT",
        &uri,
        Some(book("Dune Messiah", "Science Fiction", None)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Dune Messiah");
    assert_eq!(updated["id"], id);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "BOOK_NOT_FOUND");
}

#[tokio::test]
async fn test_update_missing_book_is_not_found() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/books/999",
        Some(book("Ghost", "Horror", None)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Search Tests
// ============================================================================

#[tokio::test]
async fn test_search_by_title() {
    let app = create_test_app();
    create(&app, "Dune Messiah", "Science Fiction").await;
    create(&app, "Dune", "Science Fiction").await;
    create(&app, "Foundation", "Science Fiction").await;

    let (status, json) = send(&app, "GET", "/api/v1/books?title=dune&sort=title", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["books"][0]["title"], "Dune");
    assert_eq!(json["books"][1]["title"], "Dune Messiah");
}

#[tokio::test]
async fn test_search_combines_criteria() {
    let app = create_test_app();
    create(&app, "Dune", "Science Fiction").await;
    create(&app, "Dune Road", "Travel").await;

    let (_, json) = send(&app, "GET", "/api/v1/books?title=dune&genre=travel", None).await;

    assert_eq!(json["count"], 1);
    assert_eq!(json["books"][0]["title"], "Dune Road");
}

#[tokio::test]
async fn test_search_without_criteria_returns_all() {
    let app = create_test_app();
    create(&app, "Dune", "Science Fiction").await;
    create(&app, "Emma", "Classic").await;

    let (status, json) = send(&app, "GET", "/api/v1/books", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
}

#[tokio::test]
async fn test_search_rejects_bad_date_and_sort() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api/v1/books?published_on=31-31-2020", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "published_on");

    let (status, json) = send(&app, "GET", "/api/v1/books?sort=price", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

// ============================================================================
// Genre Tests
// ============================================================================

#[tokio::test]
async fn test_genres_are_distinct_and_sorted() {
    let app = create_test_app();
    create(&app, "Dune", "Science Fiction").await;
    create(&app, "The Hobbit", "Fantasy").await;
    create(&app, "Hyperion", "Science Fiction").await;

    let (status, json) = send(&app, "GET", "/api/v1/genres", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["genres"], json!(["Fantasy", "Science Fiction"]));
}

#[tokio::test]
async fn test_books_in_genres_trims_names() {
    let app = create_test_app();
    create(&app, "Dune", "Science Fiction").await;
    create(&app, "The Hobbit", "Fantasy").await;
    create(&app, "Emma", "Classic").await;

    let (status, json) = send(
        &app,
        "GET",
        "/api/v1/genres/books?names=%20Fantasy%20,Science%20Fiction",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    let titles: Vec<&str> = json["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "The Hobbit"]);
}

#[tokio::test]
async fn test_books_in_genres_requires_names() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api/v1/genres/books", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

// ============================================================================
// ISBN Import Tests
// ============================================================================

fn app_with_metadata() -> Router {
    let config = Config::default();
    let source = StaticMetadataSource::new([BookMetadata {
        isbn: "9780441172719".into(),
        title: "Dune".into(),
        author: "Frank Herbert".into(),
        publisher: "Chilton Books".into(),
        genre: "Science Fiction".into(),
        published_on: NaiveDate::from_ymd_opt(1965, 1, 1),
    }]);
    let state = AppState::in_memory(&config).with_metadata(Arc::new(source));
    create_router_with_state(&config, state)
}

#[tokio::test]
async fn test_import_creates_then_reuses() {
    let app = app_with_metadata();
    let request = json!({ "isbn": "9780441172719" });

    let (status, first) = send(&app, "POST", "/api/v1/books/import", Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);
    assert_eq!(first["book"]["author"], "Frank Herbert");
    assert_eq!(first["book"]["published_on"], "1965-01-01");

    let (status, second) = send(&app, "POST", "/api/v1/books/import", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["book"]["id"], first["book"]["id"]);
}

#[tokio::test]
async fn test_import_unknown_isbn() {
    let app = app_with_metadata();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/books/import",
        Some(json!({ "isbn": "9780000000000" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ISBN_NOT_FOUND");
}

// ============================================================================
// Similarity Tests
// ============================================================================

#[tokio::test]
async fn test_recompute_links_same_genre() {
    let app = create_test_app();
    let x = create(&app, "X", "Fantasy").await;
    let y = create(&app, "Y", "Fantasy").await;
    let z = create(&app, "Z", "History").await;

    let (status, json) = send(&app, "POST", "/api/v1/similarities/recompute?wait=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "succeeded");
    assert_eq!(json["report"]["edges_inserted"], 1);

    let (_, similar) = send(&app, "GET", &format!("/api/v1/books/{x}/similar"), None).await;
    assert_eq!(similar["count"], 1);
    assert_eq!(similar["books"][0]["id"], y);

    let (_, similar) = send(&app, "GET", &format!("/api/v1/books/{z}/similar"), None).await;
    assert_eq!(similar["count"], 0);

    // Idempotent
    let (_, json) = send(&app, "POST", "/api/v1/similarities/recompute?wait=true", None).await;
    assert_eq!(json["report"]["edges_inserted"], 0);
}

#[tokio::test]
async fn test_similar_for_unknown_book() {
    let app = create_test_app();

    let (status, _) = send(&app, "GET", "/api/v1/books/42/similar", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recompute_status_starts_idle() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api/v1/similarities/recompute", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_background_recompute_and_conflict() {
    let config = Config::default();
    let edges = Arc::new(MemorySimilarityStore::new());
    let books = Arc::new(MemoryBookStore::linked_to(edges.clone()));
    let state = AppState::new(
        books,
        edges.clone(),
        Arc::new(StaticMetadataSource::default()),
        &config,
        "memory",
    );
    let app = create_router_with_state(&config, state);
    create(&app, "X", "Fantasy").await;
    create(&app, "Y", "Fantasy").await;

    // Hold the store's recompute transaction so the pass stays parked
    let blocker = edges.begin_recompute().await.unwrap();

    let (status, json) = send(&app, "POST", "/api/v1/similarities/recompute", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["state"], "running");

    let (status, json) = send(&app, "POST", "/api/v1/similarities/recompute", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "RECOMPUTE_RUNNING");

    blocker.rollback().await.unwrap();

    let mut last = Value::Null;
    for _ in 0..100 {
        let (_, json) = send(&app, "GET", "/api/v1/similarities/recompute", None).await;
        if json["state"] != "running" {
            last = json;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last["state"], "succeeded");
    assert_eq!(edges.edge_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_failed_recompute_reports_phase() {
    let config = Config::default();
    let edges = Arc::new(MemorySimilarityStore::new());
    let books = Arc::new(MemoryBookStore::linked_to(edges.clone()));
    let state = AppState::new(
        books,
        edges.clone(),
        Arc::new(StaticMetadataSource::default()),
        &config,
        "memory",
    );
    let app = create_router_with_state(&config, state);
    create(&app, "X", "Fantasy").await;
    create(&app, "Y", "Fantasy").await;
    edges.fail_inserts_after(0);

    let (status, json) = send(&app, "POST", "/api/v1/similarities/recompute?wait=true", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "RECOMPUTE_FAILED");

    let (_, json) = send(&app, "GET", "/api/v1/similarities/recompute", None).await;
    assert_eq!(json["state"], "failed");
    assert_eq!(json["phase"], "edge write");
    assert!(edges.edges().is_empty());
}
