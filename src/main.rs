//! # Weaviate Skills CLI (`wsk`)
//!
//! The `wsk` binary exposes collection management, data import, filtered
//! fetches and search against a hosted Weaviate cluster, plus offline
//! tools for filter expressions.
//!
//! ## Usage
//!
//! ```bash
//! wsk [--config ./config/wsk.toml] [-v] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wsk collections list` | List all collections |
//! | `wsk collections get <name>` | Show one collection's configuration |
//! | `wsk collections create --name N --properties JSON` | Create a collection |
//! | `wsk collections explore <name>` | Object count, property statistics and samples |
//! | `wsk fetch <collection>` | Fetch objects by UUID or filter |
//! | `wsk search <mode> --query Q --collection C` | Keyword, semantic or hybrid search |
//! | `wsk import <file> --collection C` | Import CSV, JSON or JSONL |
//! | `wsk filter check <json>` | Validate a filter and print its native form |
//! | `wsk filter eval <json> --record <json>` | Evaluate a filter against a record |
//!
//! Results go to stdout; status lines and warnings go to stderr and are
//! controlled with `-v` / `-vv` or the `WSK_LOG` environment variable.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use weaviate_skills::config::{self, DEFAULT_CONFIG_PATH};
use weaviate_skills::{collections, fetch, filter_cmd, import, search};
use weaviate_skills_core::query::SearchMode;

/// Weaviate Skills CLI: collections, imports, filtered fetches and search
/// for hosted Weaviate clusters.
///
/// Connection settings come from `WEAVIATE_URL` and `WEAVIATE_API_KEY`
/// (or the `[weaviate]` section of the config file).
#[derive(Parser)]
#[command(
    name = "wsk",
    about = "Weaviate Skills: collections, imports, filtered fetches and search for hosted Weaviate",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional. When the default path does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List, inspect and create collections.
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },

    /// Fetch objects by UUID or with a structured filter.
    ///
    /// Filters are JSON: a comparison `{"property", "operator", "value"}`,
    /// a combinator `{"operator": "and"|"or", "filters": [...]}`, or a list
    /// (implicit AND).
    Fetch {
        /// Collection name.
        collection: String,

        /// Fetch a single object by UUID.
        #[arg(long)]
        id: Option<String>,

        /// Filter expression (JSON).
        #[arg(short, long)]
        filters: Option<String>,

        /// Maximum number of objects (defaults to `search.default_limit`).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of matching objects to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Comma-separated properties to return (default: all).
        #[arg(short, long)]
        properties: Option<String>,

        /// Reject filters on properties the collection does not define.
        #[arg(long)]
        strict: bool,

        /// Output JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },

    /// Search a collection.
    Search {
        /// Search mode: keyword (BM25), semantic (nearText) or hybrid.
        #[arg(value_parser = parse_mode)]
        mode: SearchMode,

        /// Search query text.
        #[arg(short, long)]
        query: String,

        /// Collection name.
        #[arg(short, long)]
        collection: String,

        /// Maximum results (defaults to `search.default_limit`).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Comma-separated properties to search (keyword and hybrid).
        #[arg(short, long)]
        properties: Option<String>,

        /// Hybrid balance: 1.0 = vector only, 0.0 = keyword only.
        #[arg(short, long)]
        alpha: Option<f64>,

        /// Maximum vector distance (semantic).
        #[arg(short, long)]
        distance: Option<f64>,

        /// Target vector name for collections with named vectors.
        #[arg(short, long)]
        target_vector: Option<String>,

        /// Filter expression (JSON) applied before ranking.
        #[arg(short, long)]
        filters: Option<String>,

        /// Output JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },

    /// Import a CSV, JSON (array of objects) or JSONL file.
    Import {
        /// Path to the data file.
        file: PathBuf,

        /// Target collection.
        #[arg(short, long)]
        collection: String,

        /// JSON object renaming file columns/keys to properties.
        #[arg(short, long)]
        mapping: Option<String>,

        /// Tenant for multi-tenant collections.
        #[arg(short, long)]
        tenant: Option<String>,

        /// Objects per batch (defaults to `import.batch_size`).
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },

    /// Work with filter expressions offline.
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },
}

#[derive(Subcommand)]
enum CollectionsAction {
    /// List all collections.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one collection's configuration.
    Get {
        /// Collection name.
        name: String,

        #[arg(long)]
        json: bool,
    },

    /// Create a collection.
    Create {
        /// Collection name. A lower-case first letter is capitalized.
        #[arg(short, long)]
        name: String,

        /// JSON array of property definitions, e.g.
        /// `[{"name": "title", "data_type": "text"}]`.
        #[arg(short, long)]
        properties: String,

        /// Collection description.
        #[arg(short, long)]
        description: Option<String>,

        /// Vectorizer, e.g. `text2vec_openai` or `none`.
        #[arg(long)]
        vectorizer: Option<String>,

        /// Replication factor.
        #[arg(long)]
        replication_factor: Option<u32>,

        /// Enable multi-tenancy.
        #[arg(long)]
        multi_tenancy: bool,

        /// Create tenants on first insert (requires --multi-tenancy).
        #[arg(long)]
        auto_tenant_creation: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show object count, per-property statistics and sample objects.
    Explore {
        /// Collection name.
        name: String,

        /// Number of sample objects to show.
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Skip property statistics (faster).
        #[arg(long)]
        no_metrics: bool,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FilterAction {
    /// Validate a filter and print the native filter it translates to.
    Check {
        /// Filter expression (JSON), or `-` to read stdin.
        filter: String,

        /// Print the GraphQL `where:` argument instead of REST JSON.
        #[arg(long)]
        graphql: bool,
    },

    /// Evaluate a filter against a JSON record; prints `true` or `false`.
    Eval {
        /// Filter expression (JSON), or `-` to read stdin.
        filter: String,

        /// The record, a JSON object.
        #[arg(short, long)]
        record: String,

        /// Treat a filter on an absent property as an error instead of a non-match.
        #[arg(long)]
        strict_missing: bool,
    },
}

fn parse_mode(s: &str) -> Result<SearchMode, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("WSK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Offline commands need no configuration.
    if let Commands::Filter { action } = &cli.command {
        return match action {
            FilterAction::Check { filter, graphql } => filter_cmd::run_check(filter, *graphql),
            FilterAction::Eval {
                filter,
                record,
                strict_missing,
            } => filter_cmd::run_eval(filter, record, *strict_missing),
        };
    }

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Collections { action } => match action {
            CollectionsAction::List { json } => collections::run_list(&cfg, json).await?,
            CollectionsAction::Get { name, json } => {
                collections::run_get(&cfg, &name, json).await?
            }
            CollectionsAction::Create {
                name,
                properties,
                description,
                vectorizer,
                replication_factor,
                multi_tenancy,
                auto_tenant_creation,
                json,
            } => {
                let args = collections::CreateArgs {
                    name,
                    properties,
                    description,
                    vectorizer,
                    replication_factor,
                    multi_tenancy,
                    auto_tenant_creation,
                };
                collections::run_create(&cfg, &args, json).await?
            }
            CollectionsAction::Explore {
                name,
                limit,
                no_metrics,
                json,
            } => collections::run_explore(&cfg, &name, limit, no_metrics, json).await?,
        },
        Commands::Fetch {
            collection,
            id,
            filters,
            limit,
            offset,
            properties,
            strict,
            json,
        } => {
            let args = fetch::FetchArgs {
                collection,
                id,
                filters,
                limit,
                offset,
                properties,
                strict,
            };
            fetch::run_fetch(&cfg, &args, json).await?;
        }
        Commands::Search {
            mode,
            query,
            collection,
            limit,
            properties,
            alpha,
            distance,
            target_vector,
            filters,
            json,
        } => {
            let args = search::SearchArgs {
                mode,
                query,
                collection,
                limit,
                properties,
                alpha,
                distance,
                target_vector,
                filters,
            };
            search::run_search(&cfg, &args, json).await?;
        }
        Commands::Import {
            file,
            collection,
            mapping,
            tenant,
            batch_size,
            json,
        } => {
            let args = import::ImportArgs {
                file,
                collection,
                mapping,
                tenant,
                batch_size,
            };
            import::run_import(&cfg, &args, json).await?;
        }
        Commands::Filter { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
