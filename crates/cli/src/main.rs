//! Zenith Market CLI - Catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Validate the embedded catalog
//! zenith-cli catalog check
//!
//! # Validate a catalog file
//! zenith-cli catalog check --path data/catalog.json
//!
//! # List products the storefront would show for a filter
//! zenith-cli catalog list --category Home --tag smart --max-price 80
//! ```
//!
//! # Commands
//!
//! - `catalog check` - Load and validate a catalog, report counts
//! - `catalog list` - Run the product filter against a catalog

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "zenith-cli")]
#[command(author, version, about = "Zenith Market CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect product catalogs
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Args)]
struct CatalogSource {
    /// Catalog JSON file (default: embedded catalog)
    #[arg(short, long, env = "STOREFRONT_CATALOG_PATH")]
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate a catalog and print its size
    Check {
        #[command(flatten)]
        source: CatalogSource,
    },
    /// List products matching a filter, in catalog order
    List {
        #[command(flatten)]
        source: CatalogSource,

        /// Case-insensitive search over name and description
        #[arg(short, long)]
        q: Option<String>,

        /// Category to include (repeatable)
        #[arg(short, long = "category")]
        categories: Vec<String>,

        /// Tag to include, matching any (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Lowest price, inclusive
        #[arg(long)]
        min_price: Option<Decimal>,

        /// Highest price, inclusive
        #[arg(long)]
        max_price: Option<Decimal>,
    },
}

fn main() -> ExitCode {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Catalog { action } => match action {
            CatalogAction::Check { source } => {
                commands::catalog::check(source.path.as_deref())?;
            }
            CatalogAction::List {
                source,
                q,
                categories,
                tags,
                min_price,
                max_price,
            } => {
                let query = commands::catalog::ListQuery {
                    search: q.unwrap_or_default(),
                    categories,
                    tags,
                    min_price,
                    max_price,
                };
                commands::catalog::list(source.path.as_deref(), &query)?;
            }
        },
    }
    Ok(())
}
