//! Integration tests for the PostgreSQL backend.
//!
//! These need a scratch database: every test truncates the catalog.
//! Run with:
//!   DATABASE_URL=postgres://localhost/shelf_test \
//!     cargo test --package shelf-core --test postgres_store -- --ignored

#![cfg(feature = "postgres")]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use shelf_core::store::{
    self, BookStore, PgBookStore, PgSimilarityStore, SimilarityStore, SimilarityTx,
};
use shelf_core::{
    Book, BookId, BookUpdate, CatalogService, FilterCriteria, FilterQuery, NewBook,
    RecomputeError, RecomputePhase, SimilarityGraphBuilder, SortOrder, StoreError,
};
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

/// Tests share one database, so they take turns.
static DATABASE: Mutex<()> = Mutex::const_new(());

struct PgFixture {
    pool: PgPool,
    books: Arc<PgBookStore>,
    edges: Arc<PgSimilarityStore>,
    catalog: CatalogService,
    _turn: MutexGuard<'static, ()>,
}

impl PgFixture {
    async fn new() -> Self {
        let turn = DATABASE.lock().await;
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must point at a scratch PostgreSQL database");

        let pool = store::connect(&url, 4, 1).await.expect("connect");
        store::migrate(&pool).await.expect("migrate");
        sqlx::query("TRUNCATE books RESTART IDENTITY CASCADE")
            .execute(&pool)
            .await
            .expect("truncate catalog");

        let books = Arc::new(PgBookStore::new(pool.clone()));
        Self {
            edges: Arc::new(PgSimilarityStore::new(pool.clone())),
            catalog: CatalogService::new(books.clone()),
            books,
            pool,
            _turn: turn,
        }
    }

    fn builder(&self) -> SimilarityGraphBuilder {
        SimilarityGraphBuilder::new(self.books.clone(), self.edges.clone())
    }

    async fn add(&self, title: &str, genre: &str, published_on: Option<&str>) -> Book {
        self.catalog
            .register(NewBook {
                title: title.into(),
                author: "Author".into(),
                publisher: "Publisher".into(),
                genre: genre.into(),
                published_on: published_on
                    .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").expect("date")),
                ..Default::default()
            })
            .await
            .expect("register book")
    }

    async fn rows(&self) -> BTreeSet<(BookId, BookId)> {
        sqlx::query_as::<_, (i64, i64)>("SELECT book_id, similar_id FROM similar_books")
            .fetch_all(&self.pool)
            .await
            .expect("read similar_books")
            .into_iter()
            .collect()
    }

    async fn titles(&self, criteria: FilterCriteria) -> Vec<String> {
        self.catalog
            .search(&criteria, SortOrder::Title)
            .await
            .expect("search")
            .into_iter()
            .map(|book| book.title)
            .collect()
    }
}

/// Book store that answers from a catalog snapshot taken before some books
/// were deleted, as a pass racing a delete would see it.
struct StaleCatalog {
    inner: Arc<PgBookStore>,
    snapshot: Vec<Book>,
}

#[async_trait]
impl BookStore for StaleCatalog {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        Ok(self.snapshot.clone())
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        self.inner.find_by_isbn(isbn).await
    }

    async fn find_by_genre_excluding(
        &self,
        genre: &str,
        exclude_id: BookId,
    ) -> Result<Vec<Book>, StoreError> {
        Ok(self
            .snapshot
            .iter()
            .filter(|book| book.genre == genre && book.id != exclude_id)
            .cloned()
            .collect())
    }

    async fn list_genres(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_genres().await
    }

    async fn find_by_genres(&self, genres: &[String]) -> Result<Vec<Book>, StoreError> {
        self.inner.find_by_genres(genres).await
    }

    async fn find_by_criteria(&self, query: &FilterQuery) -> Result<Vec<Book>, StoreError> {
        self.inner.find_by_criteria(query).await
    }

    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        self.inner.insert(book).await
    }

    async fn update(&self, id: BookId, update: BookUpdate) -> Result<Book, StoreError> {
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        self.inner.check_health().await
    }
}

// ============================================================================
// Filter queries
// ============================================================================

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_title_filter_finds_both_dune_books() {
    let fx = PgFixture::new().await;
    fx.add("Dune", "Science Fiction", None).await;
    fx.add("Dune Messiah", "Science Fiction", None).await;
    fx.add("Foundation", "Science Fiction", None).await;

    let titles = fx
        .titles(FilterCriteria {
            title: Some("dune".into()),
            ..Default::default()
        })
        .await;

    assert_eq!(titles, vec!["Dune", "Dune Messiah"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_wildcards_in_criteria_are_literal() {
    let fx = PgFixture::new().await;
    fx.add("100% Cotton", "Craft", None).await;
    fx.add("1000 Cottages", "Travel", None).await;
    fx.add("snake_case", "Programming", None).await;
    fx.add("snakeXcase", "Programming", None).await;

    let percent = fx
        .titles(FilterCriteria {
            title: Some("100%".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(percent, vec!["100% Cotton"]);

    let underscore = fx
        .titles(FilterCriteria {
            title: Some("e_c".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(underscore, vec!["snake_case"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_combined_criteria_bind_in_order() {
    let fx = PgFixture::new().await;
    let dune = fx.add("Dune", "Science Fiction", Some("1965-08-01")).await;
    fx.add("Dune Messiah", "Science Fiction", Some("1969-10-15")).await;
    fx.add("Dune Cookbook", "Cooking", Some("1965-08-01")).await;

    let found = fx
        .catalog
        .search(
            &FilterCriteria {
                id: Some(dune.id.to_string()),
                title: Some("Dune".into()),
                genre: Some("fiction".into()),
                published_on: Some("01/08/1965".into()),
                ..Default::default()
            },
            SortOrder::Unsorted,
        )
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0], dune);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_genres_are_distinct_and_sorted() {
    let fx = PgFixture::new().await;
    fx.add("A", "Science Fiction", None).await;
    fx.add("B", "Fantasy", None).await;
    fx.add("C", "Science Fiction", None).await;
    fx.add("D", "", None).await;

    assert_eq!(
        fx.catalog.genres().await.unwrap(),
        vec!["Fantasy".to_string(), "Science Fiction".to_string()]
    );
    let fantasy = fx.catalog.in_genres(&[" Fantasy ".into()]).await.unwrap();
    assert_eq!(fantasy.len(), 1);
}

// ============================================================================
// Recompute
// ============================================================================

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_same_genre_books_are_linked() {
    let fx = PgFixture::new().await;
    let x = fx.add("X", "Fantasy", None).await;
    let y = fx.add("Y", "Fantasy", None).await;
    let z = fx.add("Z", "History", None).await;

    let report = fx.builder().recompute().await.unwrap();

    assert_eq!(report.books_scanned, 3);
    assert_eq!(report.edges_inserted, 1);
    assert_eq!(fx.rows().await, BTreeSet::from([(x.id, y.id), (y.id, x.id)]));
    assert!(fx.edges.neighbors(z.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_second_pass_writes_nothing() {
    let fx = PgFixture::new().await;
    for title in ["A", "B", "C"] {
        fx.add(title, "Fantasy", None).await;
    }
    fx.add("D", "Poetry", None).await;
    let builder = fx.builder();

    let first = builder.recompute().await.unwrap();
    let after_first = fx.rows().await;
    let second = builder.recompute().await.unwrap();

    assert_eq!(first.edges_inserted, 3);
    assert_eq!(second.edges_inserted, 0);
    assert_eq!(after_first.len(), 6);
    assert_eq!(fx.rows().await, after_first);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_pass_racing_a_delete_rolls_back() {
    let fx = PgFixture::new().await;
    fx.add("X", "Fantasy", None).await;
    fx.add("Y", "Fantasy", None).await;
    let z = fx.add("Z", "Fantasy", None).await;

    let snapshot = fx.books.list_all().await.unwrap();
    fx.books.delete(z.id).await.unwrap();
    let stale = Arc::new(StaleCatalog {
        inner: fx.books.clone(),
        snapshot,
    });

    // (X, Y) is written before (X, Z) trips the foreign key
    let err = SimilarityGraphBuilder::new(stale, fx.edges.clone())
        .recompute()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RecomputeError::Failed {
            phase: RecomputePhase::EdgeWrite,
            ..
        }
    ));
    assert!(fx.rows().await.is_empty());
    assert_eq!(fx.edges.edge_count().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_delete_removes_edges() {
    let fx = PgFixture::new().await;
    let x = fx.add("X", "Fantasy", None).await;
    let y = fx.add("Y", "Fantasy", None).await;
    fx.builder().recompute().await.unwrap();

    fx.catalog.remove(x.id).await.unwrap();

    assert!(fx.rows().await.is_empty());
    assert!(fx.edges.neighbors(y.id).await.unwrap().is_empty());
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_uncommitted_rows_are_discarded() {
    let fx = PgFixture::new().await;
    let x = fx.add("X", "Fantasy", None).await;
    let y = fx.add("Y", "Fantasy", None).await;

    let mut tx = fx.edges.begin_recompute().await.unwrap();
    assert!(tx.insert_pair(x.id, y.id).await.unwrap());
    assert!(!tx.insert_pair(y.id, x.id).await.unwrap());
    assert!(tx.exists(y.id, x.id).await.unwrap());
    assert_eq!(fx.edges.edge_count().await.unwrap(), 0);
    tx.rollback().await.unwrap();

    assert!(fx.rows().await.is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn test_recompute_transactions_are_exclusive() {
    let fx = PgFixture::new().await;
    let x = fx.add("X", "Fantasy", None).await;
    let y = fx.add("Y", "Fantasy", None).await;

    let mut first = fx.edges.begin_recompute().await.unwrap();
    first.insert_pair(x.id, y.id).await.unwrap();

    let edges = fx.edges.clone();
    let second = tokio::spawn(async move { edges.begin_recompute().await.map(|_tx| ()) });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!second.is_finished(), "second transaction got the lock");

    first.commit().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), second)
        .await
        .expect("lock released at commit")
        .unwrap()
        .unwrap();

    assert_eq!(fx.rows().await, BTreeSet::from([(x.id, y.id), (y.id, x.id)]));
}
