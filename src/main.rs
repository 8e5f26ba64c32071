// SPDX-License-Identifier: MIT OR Apache-2.0

//! artgrep - Local semantic image search tool
//!
//! Indexes image collections with CLIP embeddings and searches them with
//! natural-language queries.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, OutputFormat};
use colored::Colorize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use artgrep::config::{CollectionConfig, Config};
use artgrep::embedding::{create_provider, IndexStore, SharedProvider};
use artgrep::filters::SearchFilters;
use artgrep::indexer::{scan_collections, watch, IndexMode, IndexWorker, Indexer};
use artgrep::output::{
    colorize_context, colorize_name, colorize_path, colorize_score, format_size, to_json,
    use_colors,
};
use artgrep::query::SearchEngine;
use artgrep::service::SearchService;
use artgrep::utils::resolve_index_dir;

/// Settings shared by every subcommand
struct Session {
    config: Config,
    store: Arc<IndexStore>,
    format: OutputFormat,
    compact: bool,
}

impl Session {
    fn provider(&self) -> Result<SharedProvider> {
        create_provider(self.config.embeddings()).context("Failed to initialize embedding provider")
    }

    fn indexer(&self, provider: SharedProvider, collections: Vec<CollectionConfig>) -> Indexer {
        Indexer::new(self.store.clone(), provider, collections)
            .with_progress(self.format == OutputFormat::Text)
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", to_json(value, self.compact)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    // Initialize tracing with ARTGREP_LOG env var (e.g., ARTGREP_LOG=debug artgrep search "query")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ARTGREP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "artgrep", &mut std::io::stdout());
        return Ok(());
    }

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_file(Path::new(path))?,
        None => Config::load(),
    };
    let index_dir = resolve_index_dir(cli.index_dir.as_deref(), config.index().dir());
    let ctx = Session {
        store: Arc::new(IndexStore::open(index_dir)),
        config,
        format: cli.format,
        compact: cli.compact,
    };

    match cli.command {
        Commands::Search {
            query,
            limit,
            glob,
            directory,
            collection,
            min_score,
            no_build,
            paths,
        } => {
            let filters = SearchFilters {
                glob,
                directory,
                collection,
                min_score,
            };
            run_search(&ctx, &query, limit, &filters, no_build, &paths)?;
        }
        Commands::Index {
            paths,
            force,
            no_recursive,
        } => {
            run_index(&ctx, &paths, force, !no_recursive)?;
        }
        Commands::Status => {
            run_status(&ctx)?;
        }
        Commands::Scan {
            paths,
            no_recursive,
        } => {
            run_scan(&ctx, &paths, !no_recursive)?;
        }
        Commands::Watch { paths, debounce } => {
            let provider = ctx.provider()?;
            let collections = ctx.config.collections_or(&paths, true);
            watch::run(ctx.indexer(provider, collections), Some(debounce))?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn run_search(
    ctx: &Session,
    query: &str,
    limit: Option<usize>,
    filters: &SearchFilters,
    no_build: bool,
    paths: &[String],
) -> Result<()> {
    let provider = ctx.provider()?;
    let indexer = Arc::new(ctx.indexer(provider.clone(), ctx.config.collections_or(paths, true)));
    let worker = Arc::new(IndexWorker::spawn(indexer));
    let engine = SearchEngine::new(ctx.store.clone(), provider)
        .with_worker(worker.clone())
        .build_if_empty(!no_build && ctx.config.search().build_if_empty());
    let service = SearchService::new(worker, engine, ctx.config.search().max_results());

    let filters = (!filters.is_empty()).then_some(filters);
    let response = service.search(query, limit, filters)?;

    match ctx.format {
        OutputFormat::Json => ctx.print_json(&json!({
            "query": query,
            "results": response.results,
            "total": response.total,
        })),
        OutputFormat::Text => {
            let use_color = use_colors();
            if response.results.is_empty() {
                println!("{} No matching images for: {}", "→".yellow(), query);
                return Ok(());
            }
            for (rank, result) in response.results.iter().enumerate() {
                let record = &result.record;
                println!(
                    "{:>3}. {}  {}",
                    rank + 1,
                    colorize_score(result.similarity_score, use_color),
                    colorize_path(&record.path, use_color)
                );
                let mut details = vec![
                    format_size(record.size),
                    record.modified.format("%Y-%m-%d %H:%M").to_string(),
                ];
                if let Some(collection) = &record.collection {
                    details.insert(0, collection.clone());
                }
                println!(
                    "     {}",
                    colorize_context(&details.join(" · "), use_color)
                );
            }
            println!("\n{} {} result(s)", "✓".green(), response.total);
            Ok(())
        }
    }
}

fn run_index(ctx: &Session, paths: &[String], force: bool, recursive: bool) -> Result<()> {
    let provider = ctx.provider()?;
    let indexer = ctx.indexer(provider, ctx.config.collections_or(paths, recursive));

    if ctx.format == OutputFormat::Text {
        for collection in indexer.collections() {
            println!(
                "{} Indexing {} ({})",
                "→".cyan(),
                collection.path.display(),
                collection.name
            );
        }
    }

    let report = indexer
        .build(IndexMode::from_force(force))
        .context("Indexing failed")?;

    match ctx.format {
        OutputFormat::Json => ctx.print_json(&report),
        OutputFormat::Text => {
            println!(
                "{} Indexed {} images ({} new, {} unchanged, {} failed) in {:.1}s",
                "✓".green(),
                report.total_indexed,
                report.embedded,
                report.skipped,
                report.failed,
                report.duration_ms as f64 / 1000.0
            );
            if let Some(updated) = report.last_updated {
                println!("  Last updated: {}", updated.to_rfc3339());
            }
            Ok(())
        }
    }
}

fn run_status(ctx: &Session) -> Result<()> {
    let status = ctx.store.status()?;
    let history = ctx.store.load_history()?;

    match ctx.format {
        OutputFormat::Json => ctx.print_json(&json!({
            "indexed": status.indexed,
            "total_indexed": status.total_indexed,
            "last_updated": status.last_updated,
            "model": status.model,
            "dimension": status.dimension,
            "history": history,
        })),
        OutputFormat::Text => {
            let use_color = use_colors();
            println!(
                "Index:        {}",
                colorize_path(&ctx.store.dir().display().to_string(), use_color)
            );
            if !status.indexed {
                println!("{} No index yet; run `artgrep index`", "→".yellow());
                return Ok(());
            }
            println!("Images:       {}", status.total_indexed);
            if let Some(updated) = status.last_updated {
                println!("Last updated: {}", updated.to_rfc3339());
            }
            if let Some(model) = &status.model {
                println!("Model:        {}", colorize_name(model, use_color));
            }
            if let Some(avg) = history.average_duration_seconds {
                println!(
                    "Recent runs:  {} (avg {:.1}s)",
                    history.executions.len(),
                    avg
                );
            }
            Ok(())
        }
    }
}

fn run_scan(ctx: &Session, paths: &[String], recursive: bool) -> Result<()> {
    let mut candidates = scan_collections(&ctx.config.collections_or(paths, recursive));
    candidates.sort_by(|a, b| a.path.cmp(&b.path));

    match ctx.format {
        OutputFormat::Json => ctx.print_json(&json!({
            "images": candidates,
            "total": candidates.len(),
        })),
        OutputFormat::Text => {
            let use_color = use_colors();
            for candidate in &candidates {
                println!(
                    "{}  {}",
                    colorize_path(&candidate.path.display().to_string(), use_color),
                    colorize_context(&format_size(candidate.size), use_color)
                );
            }
            println!("\n{} {} image(s) found", "✓".green(), candidates.len());
            Ok(())
        }
    }
}
