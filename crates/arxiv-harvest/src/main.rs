//! # arXiv Harvest CLI (`axh`)
//!
//! ## Usage
//!
//! ```bash
//! axh --config ./config/axh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `axh init` | Create the SQLite database and the configured collection |
//! | `axh load` | Harvest a topic, embed the abstracts, and store them |
//! | `axh harvest` | Harvest a topic and print the records without storing |
//! | `axh search "<query>"` | Run `arxiv_search` against the collection |
//! | `axh get <id>` | Print one stored record |
//! | `axh stats` | Record and embedding counts |
//! | `axh serve` | Start the tool-calling HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Harvest 50 RAG papers from cs.AI and store them
//! axh load --topic RAG --total 50
//!
//! # Keyword search, skipping the first hit
//! axh search "graph retrieval" --mode keyword --skip 1
//!
//! # Inspect a harvest without touching the database
//! axh harvest --topic "tool use" --total 10 --json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use arxiv_harvest::load::LoadOptions;
use arxiv_harvest::{config, get, load, logging, migrate, search, server, stats};

/// arXiv Harvest CLI: collect arXiv abstracts into a searchable, embedded
/// collection for retrieval-augmented agents.
#[derive(Parser)]
#[command(
    name = "axh",
    about = "arXiv Harvest: harvest, embed, and search arXiv abstracts",
    version,
    long_about = "arXiv Harvest pages through the arXiv query API for a topic, embeds each \
    abstract in fixed-size batches, stores the records in SQLite, and exposes keyword and \
    semantic search via a CLI and a tool-calling HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/axh.toml`. See `config/axh.example.toml`.
    #[arg(long, global = true, default_value = "./config/axh.toml")]
    config: PathBuf,

    /// Log at debug level. `RUST_LOG` overrides this.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Harvest selection shared by `load` and `harvest`.
#[derive(clap::Args)]
struct HarvestArgs {
    /// Free-text topic searched across all fields.
    #[arg(long, default_value = "RAG")]
    topic: String,

    /// Number of records to request in total.
    #[arg(long, default_value_t = 50)]
    total: i64,

    /// arXiv category filter. Defaults to `[harvest].category`.
    #[arg(long)]
    category: Option<String>,

    /// Records per API request (capped at 2000). Defaults to `[harvest].page_size`.
    #[arg(long)]
    page_size: Option<i64>,
}

impl HarvestArgs {
    fn into_options(self, batch_size: Option<usize>) -> LoadOptions {
        LoadOptions {
            topic: self.topic,
            total: self.total,
            category: self.category,
            page_size: self.page_size,
            batch_size,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and collection.
    ///
    /// Creates the SQLite file, the record table, and its FTS5 index.
    /// Running it again is safe.
    Init,

    /// Harvest, embed, and store.
    ///
    /// Fetches pages sequentially with the configured delay, then embeds
    /// and commits the records batch by batch. Ctrl-C stops at the next
    /// page or batch boundary; committed batches stay committed.
    Load {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Records per embedding call and per upsert. Defaults to `[embedding].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Harvest only and print the records.
    Harvest {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search the collection with `arxiv_search`.
    Search {
        /// Query text.
        query: String,

        /// Number of hits. Defaults to the function's declared default.
        #[arg(long)]
        count: Option<i64>,

        /// Hits to skip before the first returned one.
        #[arg(long)]
        skip: Option<i64>,

        /// `semantic` (needs an embedding provider) or `keyword`.
        #[arg(long, default_value = "semantic")]
        mode: String,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one stored record by arXiv id.
    Get {
        /// arXiv id, e.g. `2401.01234v2`.
        id: String,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show collection statistics.
    Stats {
        /// Print the counts as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the tool-calling HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load {
            harvest,
            batch_size,
        } => {
            load::run_load(&cfg, &harvest.into_options(batch_size)).await?;
        }
        Commands::Harvest { harvest, json } => {
            load::run_harvest(&cfg, &harvest.into_options(None), json).await?;
        }
        Commands::Search {
            query,
            count,
            skip,
            mode,
            json,
        } => {
            search::run_search(&cfg, &query, count, skip, &mode, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_flags() {
        let cli = Cli::try_parse_from([
            "axh", "load", "--topic", "agents", "--total", "30", "--batch-size", "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Load {
                harvest,
                batch_size,
            } => {
                assert_eq!(harvest.topic, "agents");
                assert_eq!(harvest.total, 30);
                assert_eq!(batch_size, Some(10));
                assert!(harvest.category.is_none());
            }
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::try_parse_from(["axh", "search", "rag", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("./config/axh.toml"));
        match cli.command {
            Commands::Search {
                mode, count, skip, ..
            } => {
                assert_eq!(mode, "semantic");
                assert!(count.is_none());
                assert!(skip.is_none());
            }
            _ => panic!("expected search"),
        }
    }
}
