use anyhow::Result;
use clap::{Parser, Subcommand};
use docs_index::commands::{
    init_config, load_config, print_pages, reindex, search_docs, show_config,
};
use docs_index::service::DocsService;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docs-index")]
#[command(about = "Search a locally cached, semantically indexed documentation mirror")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the cache files
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the documentation
    Search {
        /// Free-text query
        query: String,
        /// Only return pages in this category, e.g. "guides"
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of results
        #[arg(long, short)]
        limit: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the documentation cache and vector index
    Reindex {
        /// Drop the cached documentation structure as well
        #[arg(long)]
        clear_cache: bool,
        /// Refresh pages only, leaving the vector index to be built lazily
        #[arg(long)]
        skip_vector_index: bool,
    },
    /// List example pages
    Examples {
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// List guides
    Guides {
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// List API reference pages
    Api {
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Write a default configuration file, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
        Commands::Search {
            query,
            category,
            limit,
            json,
        } => {
            let service = DocsService::from_config(&config).await?;
            search_docs(&service, &query, category.as_deref(), limit, json).await?;
        }
        Commands::Reindex {
            clear_cache,
            skip_vector_index,
        } => {
            let service = DocsService::from_config(&config).await?;
            reindex(&service, clear_cache, skip_vector_index).await?;
        }
        Commands::Examples { limit } => {
            let service = DocsService::from_config(&config).await?;
            print_pages("Examples", &service.get_examples(limit).await?);
        }
        Commands::Guides { limit } => {
            let service = DocsService::from_config(&config).await?;
            print_pages("Guides", &service.get_guides(limit).await?);
        }
        Commands::Api { limit } => {
            let service = DocsService::from_config(&config).await?;
            print_pages("API Reference", &service.get_api_reference(limit).await?);
        }
    }

    Ok(())
}
