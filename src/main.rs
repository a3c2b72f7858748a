//! # wiki-kg CLI (`wkg`)
//!
//! ## Usage
//!
//! ```bash
//! wkg --config ./config/wkg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wkg crawl` | Enumerate every wiki page and write the page/entity Turtle file |
//! | `wkg load [FILES...]` | Clear the dataset and load Turtle files in order |
//! | `wkg export` | Dump the whole dataset as Turtle |
//! | `wkg status` | Show the crawl output and the store's triple count |
//! | `wkg query [NAME]` | List the configured named queries, or run one |
//! | `wkg serve` | Start the Linked-Data server |
//!
//! ## Examples
//!
//! ```bash
//! # Count what a crawl would produce, first 1000 pages only
//! wkg crawl --dry-run --limit 1000
//!
//! # Full crawl, then load everything into Fuseki
//! wkg crawl --load --progress human
//!
//! # Append one file without clearing
//! wkg load data/extra.ttl --no-clear
//!
//! # Export the merged graph
//! wkg export --output data/output/final_knowledge_graph.ttl
//! ```
//!
//! Logs go to stderr and honour `RUST_LOG` (default `wiki_kg=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wiki_kg::crawl::{self, CrawlOptions};
use wiki_kg::progress::ProgressMode;
use wiki_kg::{config, export, load, query, server, status};

/// wiki-kg: crawl a MediaWiki into a page/entity knowledge graph.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/wkg.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wkg",
    about = "Crawl a MediaWiki into a page/entity knowledge graph and serve it as Linked Data",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wkg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate every page and write document/entity triples.
    ///
    /// The output file only appears once the whole listing has been read;
    /// a failed crawl leaves any previous output untouched.
    Crawl {
        /// Stop after this many pages.
        #[arg(long)]
        limit: Option<u64>,

        /// Enumerate and count without writing a file.
        #[arg(long)]
        dry_run: bool,

        /// Output path (overrides `[output].path`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Clear the dataset and load the configured files plus the new
        /// output after a successful crawl.
        #[arg(long)]
        load: bool,

        /// Progress on stderr: `human`, `json` or `off`. Defaults to
        /// `human` when stderr is a terminal.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Load Turtle files into the triplestore.
    ///
    /// Without arguments, loads `store.load_files` then every extra file
    /// matching `store.load_globs`.
    Load {
        /// Files to load instead of the configured list.
        files: Vec<PathBuf>,

        /// Keep existing triples instead of clearing the dataset first.
        #[arg(long)]
        no_clear: bool,
    },

    /// Dump the dataset as Turtle.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show crawl output and triplestore status.
    Status,

    /// Run a named query from `[queries]`, or list them.
    Query {
        /// Query name; omit to list the configured queries.
        name: Option<String>,
    },

    /// Start the Linked-Data server on `[server].bind`.
    Serve,
}

fn parse_progress(value: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(value)
        .ok_or_else(|| format!("invalid progress mode '{}': use human, json or off", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wiki_kg=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Crawl {
            limit,
            dry_run,
            output,
            load,
            progress,
        } => {
            let opts = CrawlOptions {
                limit,
                dry_run,
                output,
                load,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            crawl::run_crawl(&cfg, opts).await?;
        }
        Commands::Load { files, no_clear } => {
            load::run_load(&cfg, &files, no_clear).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Query { name } => {
            query::run_query(&cfg, name.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
