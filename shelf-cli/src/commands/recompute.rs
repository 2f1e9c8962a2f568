//! Recompute command implementation

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use shelf_core::{RecomputeOptions, SimilarityGraphBuilder};

use crate::utils::{open_catalog, Output};

/// Execute the recompute command.
pub async fn execute(
    database_url: Option<String>,
    timeout_secs: u64,
    read_concurrency: usize,
    output: Output,
) -> Result<()> {
    let catalog = open_catalog(database_url.as_deref()).await?;

    let graph = SimilarityGraphBuilder::with_options(
        catalog.books,
        catalog.edges,
        RecomputeOptions { read_concurrency },
    );

    if !output.quiet && !output.json {
        println!("{}", "Recomputing similarity graph...".dimmed());
    }

    let report = graph
        .recompute_with_timeout(Duration::from_secs(timeout_secs))
        .await?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "✓ Similarity graph updated".green().bold());
    println!("  {}    {}", "Books scanned:".bold(), report.books_scanned);
    println!("  {}   {}", "Pairs examined:".bold(), report.pairs_examined);
    println!("  {}   {}", "Edges inserted:".bold(), report.edges_inserted);
    println!("  {}          {} ms", "Elapsed:".bold(), report.elapsed_ms);
    Ok(())
}
