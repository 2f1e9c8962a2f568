//! Genres command implementation

use anyhow::{Context, Result};
use colored::Colorize;

use crate::utils::{open_catalog, print_books, Output};

/// Execute the genres command.
///
/// Without names, prints the labels in use; with names, the books filed
/// under any of them.
pub async fn execute(
    database_url: Option<String>,
    names: Vec<String>,
    output: Output,
) -> Result<()> {
    let catalog = open_catalog(database_url.as_deref()).await?;

    if !names.is_empty() {
        let books = catalog
            .service
            .in_genres(&names)
            .await
            .context("Failed to list books by genre")?;
        return print_books(&books, output);
    }

    let genres = catalog
        .service
        .genres()
        .await
        .context("Failed to list genres")?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&genres)?);
        return Ok(());
    }
    if genres.is_empty() {
        if !output.quiet {
            println!("{}", "No genres in the catalog.".dimmed());
        }
        return Ok(());
    }
    for genre in &genres {
        println!("{genre}");
    }
    Ok(())
}
