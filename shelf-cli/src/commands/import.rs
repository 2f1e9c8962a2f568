//! Import command implementation

use anyhow::{Context, Result};
use colored::Colorize;
use shelf_core::book::validate_isbn;
use shelf_core::{BookMetadataSource, ImportOutcome, OpenLibraryClient, OpenLibraryConfig};

use crate::utils::{open_catalog, print_book, Output};

/// Execute the import command.
pub async fn execute(
    database_url: Option<String>,
    isbn: String,
    openlibrary_url: Option<String>,
    output: Output,
) -> Result<()> {
    let isbn = isbn.trim().to_string();
    validate_isbn(&isbn)?;

    let mut config = OpenLibraryConfig::default();
    if let Some(url) = openlibrary_url {
        config.base_url = url;
    }
    let source = OpenLibraryClient::with_config(config).context("Failed to build lookup client")?;

    let catalog = open_catalog(database_url.as_deref()).await?;

    if !output.quiet && !output.json {
        println!(
            "{} {} via {}",
            "Looking up".dimmed(),
            isbn,
            source.source_name()
        );
    }

    let outcome = catalog.service.register_by_isbn(&isbn, &source).await?;
    tracing::info!(
        id = outcome.book().id,
        created = outcome.is_created(),
        "Import finished"
    );

    if output.json {
        let body = serde_json::json!({
            "created": outcome.is_created(),
            "book": outcome.book(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match &outcome {
        ImportOutcome::Created(_) => println!("{}", "✓ Book imported".green().bold()),
        ImportOutcome::Existing(_) => println!("{}", "Book already in catalog".yellow().bold()),
    }
    print_book(outcome.book(), output)
}
