//! Shared helpers for CLI commands

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use shelf_core::store::{self, PgBookStore, PgSimilarityStore};
use shelf_core::{Book, CatalogService};

/// Pool bounds for a one-shot command.
const MAX_CONNECTIONS: u32 = 4;
const MIN_CONNECTIONS: u32 = 1;

/// Output flags shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print machine-readable JSON instead of tables
    pub json: bool,
    /// Suppress informational lines
    pub quiet: bool,
}

/// Stores opened against the catalog database.
pub struct Catalog {
    pub service: CatalogService,
    pub books: Arc<PgBookStore>,
    pub edges: Arc<PgSimilarityStore>,
}

/// Connect to the catalog database and bring its schema up to date.
pub async fn open_catalog(database_url: Option<&str>) -> Result<Catalog> {
    let url = database_url
        .filter(|url| !url.trim().is_empty())
        .context("DATABASE_URL is not set; pass --database-url or export DATABASE_URL")?;

    tracing::debug!(url = %redact_url(url), "Connecting to catalog database");
    let pool = store::connect(url, MAX_CONNECTIONS, MIN_CONNECTIONS)
        .await
        .context("Failed to connect to catalog database")?;
    store::migrate(&pool)
        .await
        .context("Failed to apply catalog migrations")?;

    let books = Arc::new(PgBookStore::new(pool.clone()));
    Ok(Catalog {
        service: CatalogService::new(books.clone()),
        books,
        edges: Arc::new(PgSimilarityStore::new(pool)),
    })
}

/// Hide the password part of a connection URL for logging.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            if credentials.contains(':') {
                format!("{scheme}://{user}:***@{host}")
            } else {
                format!("{scheme}://{user}@{host}")
            }
        }
        None => url.to_string(),
    }
}

/// Truncate `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Print books as a table, or as a JSON array.
pub fn print_books(books: &[Book], output: Output) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(books)?);
        return Ok(());
    }

    if books.is_empty() {
        if !output.quiet {
            println!("{}", "No books found.".dimmed());
        }
        return Ok(());
    }

    println!(
        "{:>6}  {:<32}  {:<22}  {:<16}  {:<13}  {}",
        "ID".bold(),
        "TITLE".bold(),
        "AUTHOR".bold(),
        "GENRE".bold(),
        "ISBN".bold(),
        "PUBLISHED".bold()
    );
    for book in books {
        println!(
            "{:>6}  {:<32}  {:<22}  {:<16}  {:<13}  {}",
            book.id.to_string().cyan(),
            truncate(&book.title, 32),
            truncate(&book.author, 22),
            truncate(&book.genre, 16),
            book.isbn.as_deref().unwrap_or("-"),
            book.published_on
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    if !output.quiet {
        println!();
        println!("{} book(s)", books.len());
    }
    Ok(())
}

/// Print a single book as labelled fields, or as a JSON object.
pub fn print_book(book: &Book, output: Output) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(book)?);
        return Ok(());
    }

    println!("  {}       {}", "ID:".bold(), book.id);
    println!("  {}    {}", "Title:".bold(), book.title);
    println!("  {}   {}", "Author:".bold(), book.author);
    println!("  {}{}", "Publisher:".bold(), book.publisher);
    println!("  {}    {}", "Genre:".bold(), book.genre);
    if let Some(isbn) = &book.isbn {
        println!("  {}     {}", "ISBN:".bold(), isbn);
    }
    if let Some(date) = book.published_on {
        println!("  {}{}", "Published:".bold(), date.format("%Y-%m-%d"));
    }
    println!("  {} {}", "Included:".bold(), book.included_on.format("%Y-%m-%d"));
    Ok(())
}
