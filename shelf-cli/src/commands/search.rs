//! Search command implementation

use anyhow::{Context, Result};
use shelf_core::{build_filter, FilterCriteria, SortOrder};

use crate::utils::{open_catalog, print_books, Output};

/// Execute the search command.
pub async fn execute(
    database_url: Option<String>,
    criteria: FilterCriteria,
    sort: SortOrder,
    output: Output,
) -> Result<()> {
    // Reject malformed criteria before touching the database
    let query = build_filter(&criteria)?;
    tracing::debug!(clauses = query.clauses().len(), "Filter built");

    let catalog = open_catalog(database_url.as_deref()).await?;
    let books = catalog
        .service
        .search(&criteria, sort)
        .await
        .context("Search failed")?;

    print_books(&books, output)
}
