//! Shelf CLI - search the catalog and maintain the similarity graph
//!
//! Usage:
//!   shelf search --genre Fantasy --sort-title
//!   shelf recompute --timeout-secs 120
//!   shelf similar 42
//!   shelf genres Fantasy "Science Fiction"
//!   shelf import 9780441013593

mod commands;
mod exit_codes;
mod utils;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use shelf_core::similarity::DEFAULT_READ_CONCURRENCY;
use shelf_core::{BookId, FilterCriteria, SortOrder};
use tracing_subscriber::EnvFilter;

use crate::exit_codes::ExitCode;
use crate::utils::Output;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error (unknown book, ISBN without metadata)
  64  Usage error (DATABASE_URL missing)
  65  Invalid data (unparseable date, malformed or duplicate ISBN)
  69  Service unavailable (database or Open Library unreachable)
  75  Temporary failure (recompute already running or timed out)";

#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about = "Shelf book catalog CLI", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search books; criteria are combined with AND
    Search {
        /// Fragment of the book id
        #[arg(long)]
        id: Option<String>,

        /// Fragment of the title (case-insensitive)
        #[arg(long)]
        title: Option<String>,

        /// Fragment of the author (case-insensitive)
        #[arg(long)]
        author: Option<String>,

        /// Fragment of the genre (case-insensitive)
        #[arg(long)]
        genre: Option<String>,

        /// Fragment of the ISBN
        #[arg(long)]
        isbn: Option<String>,

        /// Exact publication date (YYYY-MM-DD or DD/MM/YYYY)
        #[arg(long)]
        published_on: Option<String>,

        /// Order results by title
        #[arg(long)]
        sort_title: bool,
    },

    /// Link every pair of books sharing a genre, in one transaction
    Recompute {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Genre-group reads in flight
        #[arg(long, default_value_t = DEFAULT_READ_CONCURRENCY)]
        read_concurrency: usize,
    },

    /// List books linked to a book by the similarity graph
    Similar {
        /// Book id
        id: BookId,
    },

    /// List genre labels, or the books filed under the given genres
    Genres {
        /// Genre labels, matched exactly
        names: Vec<String>,
    },

    /// Add a book by ISBN using Open Library metadata
    Import {
        /// ISBN-13 code
        isbn: String,

        /// Open Library base URL
        #[arg(long, env = "OPENLIBRARY_URL")]
        openlibrary_url: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Search {
            id,
            title,
            author,
            genre,
            isbn,
            published_on,
            sort_title,
        } => {
            let criteria = FilterCriteria {
                id,
                title,
                author,
                genre,
                isbn,
                published_on,
            };
            let sort = if sort_title {
                SortOrder::Title
            } else {
                SortOrder::Unsorted
            };
            commands::search::execute(cli.database_url, criteria, sort, output).await
        }
        Commands::Recompute {
            timeout_secs,
            read_concurrency,
        } => {
            commands::recompute::execute(cli.database_url, timeout_secs, read_concurrency, output)
                .await
        }
        Commands::Similar { id } => commands::similar::execute(cli.database_url, id, output).await,
        Commands::Genres { names } => {
            commands::genres::execute(cli.database_url, names, output).await
        }
        Commands::Import {
            isbn,
            openlibrary_url,
        } => commands::import::execute(cli.database_url, isbn, openlibrary_url, output).await,
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => std::process::ExitCode::from(ExitCode::success().code as u8),
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {}", "error:".red().bold(), message);
            }
            std::process::ExitCode::from(exit.code as u8)
        }
    }
}
