//! PostgreSQL storage backend.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{BookStore, SimilarityStore, SimilarityTx};
use crate::book::{Book, BookId, BookUpdate, NewBook};
use crate::error::StoreError;
use crate::filter::{FilterParam, FilterQuery};

/// Advisory lock key serializing recompute passes across processes.
const RECOMPUTE_LOCK_KEY: i64 = 0x5348_454c_465f_5349; // "SHELF_SI"

const BOOK_COLUMNS: &str =
    "id, title, author, publisher, genre, isbn, published_on, included_on";

/// Open a connection pool.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    tracing::info!(
        max_connections,
        min_connections,
        "Connected to PostgreSQL database"
    );
    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Book store over the `books` table.
#[derive(Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = $1"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn find_by_genre_excluding(
        &self,
        genre: &str,
        exclude_id: BookId,
    ) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE genre = $1 AND id <> $2 ORDER BY id"
        ))
        .bind(genre)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn list_genres(&self) -> Result<Vec<String>, StoreError> {
        let genres = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT genre FROM books WHERE genre <> '' ORDER BY genre",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn find_by_genres(&self, genres: &[String]) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE genre = ANY($1) ORDER BY id"
        ))
        .bind(genres)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn find_by_criteria(&self, query: &FilterQuery) -> Result<Vec<Book>, StoreError> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE {} ORDER BY id",
            query.to_sql()
        );
        tracing::debug!(sql = %sql, params = query.params().len(), "Executing book filter");

        let mut statement = sqlx::query_as::<_, Book>(&sql);
        for param in query.params() {
            statement = match param {
                FilterParam::Text(pattern) => statement.bind(pattern.as_str()),
                FilterParam::Date(date) => statement.bind(*date),
            };
        }

        Ok(statement.fetch_all(&self.pool).await?)
    }

    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, publisher, genre, isbn, published_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.genre)
        .bind(&book.isbn)
        .bind(book.published_on)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(book_id = book.id, title = %book.title, "Book inserted");
        Ok(book)
    }

    async fn update(&self, id: BookId, update: BookUpdate) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $2, author = $3, publisher = $4, genre = $5,
                isbn = $6, published_on = $7
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.publisher)
        .bind(&update.genre)
        .bind(&update.isbn)
        .bind(update.published_on)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        // similar_books rows go with ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for PgBookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgBookStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

/// Similarity store over the `similar_books` table.
#[derive(Clone)]
pub struct PgSimilarityStore {
    pool: PgPool,
}

impl PgSimilarityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SimilarityStore for PgSimilarityStore {
    async fn begin_recompute(&self) -> Result<Box<dyn SimilarityTx>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Released automatically at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RECOMPUTE_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgSimilarityTx { tx }))
    }

    async fn neighbors(&self, id: BookId) -> Result<Vec<BookId>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT similar_id FROM similar_books WHERE book_id = $1 ORDER BY similar_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn edge_count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM similar_books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for PgSimilarityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSimilarityStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

/// Recompute transaction. sqlx rolls it back on drop.
struct PgSimilarityTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SimilarityTx for PgSimilarityTx {
    async fn exists(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM similar_books WHERE book_id = $1 AND similar_id = $2)",
        )
        .bind(a)
        .bind(b)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_pair(&mut self, a: BookId, b: BookId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO similar_books (book_id, similar_id)
            VALUES ($1, $2), ($2, $1)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgSimilarityTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgSimilarityTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
