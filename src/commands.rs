use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, resolve_config_dir};
use crate::service::{DocsService, ResolvedPage, SearchResponse};

const PREVIEW_CHARS: usize = 280;

/// Load configuration from `config_dir`, or the default base directory
#[inline]
pub fn load_config(config_dir: Option<PathBuf>) -> Result<Config> {
    let dir = resolve_config_dir(config_dir).context("Failed to resolve configuration directory")?;
    Config::load(&dir).context("Failed to load configuration")
}

/// Search the documentation and print the results
#[inline]
pub async fn search_docs(
    service: &DocsService,
    query: &str,
    category: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let response = service.search(query, category, limit).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize results")?
        );
        return Ok(());
    }

    print_search_response(query, &response);
    Ok(())
}

fn print_search_response(query: &str, response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No documentation found for '{}'.", query);
        return;
    }

    let strategy = if response.used_vector {
        format!("semantic search, {} indexed documents", response.index_size)
    } else {
        "text search".to_string()
    };
    println!(
        "{} ({} results, {})",
        style(format!("Results for '{}'", query)).bold().cyan(),
        response.results.len(),
        strategy
    );
    println!();

    for (rank, page) in response.results.iter().enumerate() {
        print_page(Some(rank + 1), page);
    }
}

/// Print a category view
#[inline]
pub fn print_pages(heading: &str, pages: &[ResolvedPage]) {
    if pages.is_empty() {
        println!("No {} found.", heading.to_lowercase());
        return;
    }

    println!(
        "{} ({} pages)",
        style(heading).bold().cyan(),
        pages.len()
    );
    println!();

    for page in pages {
        print_page(None, page);
    }
}

fn print_page(rank: Option<usize>, page: &ResolvedPage) {
    let title = style(&page.title).bold();
    match rank {
        Some(rank) => println!("{}. {}", rank, title),
        None => println!("📄 {}", title),
    }
    println!("   {}", style(&page.url).underlined().blue());
    println!("   Section: {} | Category: {}", page.section, page.category);

    let preview = preview(&page.content);
    if !preview.is_empty() {
        println!("   {}", style(preview).dim());
    }
    println!();
}

fn preview(content: &str) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= PREVIEW_CHARS {
        return flattened;
    }

    let truncated: String = flattened.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", truncated.trim_end())
}

/// Rebuild the documentation cache and vector index
#[inline]
pub async fn reindex(
    service: &DocsService,
    clear_cache: bool,
    skip_vector_index: bool,
) -> Result<()> {
    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(if skip_vector_index {
        "Refreshing documentation structure"
    } else {
        "Rebuilding documentation index"
    });

    let result = service.force_reindex(clear_cache, skip_vector_index).await;
    bar.finish_and_clear();
    let report = result?;

    println!("{}", style("Reindex complete").bold().green());
    println!("  Pages: {}", report.pages);
    if report.vector_index_skipped {
        println!("  Vector index: skipped");
    } else if report.vector_search_disabled {
        println!(
            "  Vector index: {} (embedding model unavailable)",
            style("disabled").yellow()
        );
    } else {
        println!("  Indexed documents: {}", report.indexed_documents);
    }
    if report.cache_cleared {
        println!("  Cache: cleared");
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Documentation Source:").bold().yellow());
    eprintln!("  Manifest: {}", style(&config.source.manifest_url).cyan());
    eprintln!("  Content: {}", style(&config.source.content_base_url).cyan());
    eprintln!("  Site: {}", style(&config.source.site_base_url).cyan());

    eprintln!();
    eprintln!("{}", style("Cache & Search:").bold().yellow());
    eprintln!("  Memory TTL: {}s", style(config.cache.memory_ttl_secs).cyan());
    eprintln!(
        "  Background refresh after: {}s",
        style(config.cache.refresh_after_secs).cyan()
    );
    eprintln!(
        "  Index max age: {}s",
        style(config.cache.index_max_age_secs).cyan()
    );
    eprintln!(
        "  Similarity threshold: {}",
        style(config.search.similarity_threshold).cyan()
    );
    eprintln!("  Cache directory: {}", style(config.cache_dir_path().display()).dim());

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

/// Write the current configuration (defaults if none exists) to disk
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    let path = config.config_file_path();
    if path.exists() {
        eprintln!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    config.save().context("Failed to save configuration")?;
    eprintln!(
        "{} {}",
        style("Wrote default configuration to").green(),
        path.display()
    );
    Ok(())
}
