//! Similar command implementation

use anyhow::{Context, Result};
use colored::Colorize;
use shelf_core::BookId;

use crate::utils::{open_catalog, print_books, Output};

/// Execute the similar command.
pub async fn execute(database_url: Option<String>, id: BookId, output: Output) -> Result<()> {
    let catalog = open_catalog(database_url.as_deref()).await?;

    let book = catalog.service.get(id).await?;
    let similar = catalog
        .service
        .similar_to(id, catalog.edges.as_ref())
        .await
        .with_context(|| format!("Failed to read similar books for {id}"))?;

    if !output.json && !output.quiet {
        println!(
            "{} {} ({})",
            "Books similar to".bold(),
            book.title.cyan(),
            book.genre
        );
        println!();
    }
    print_books(&similar, output)
}
