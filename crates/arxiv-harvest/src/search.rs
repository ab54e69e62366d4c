//! `axh search`: run the `arxiv_search` function from the command line.
//!
//! The flags are packed into the same [`ArgumentBag`] an HTTP caller would
//! send, so count/skip resolution is identical on both surfaces.
//!
//! # Search Modes
//!
//! - **Keyword**: FTS5 full-text search over title and abstract.
//! - **Semantic**: cosine similarity against stored abstract embeddings.

use anyhow::{bail, Result};

use arxiv_harvest_core::models::SearchHit;
use arxiv_harvest_core::params::ArgumentBag;
use arxiv_harvest_core::retrieval::{SearchFunction, SearchMode};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// The configured `arxiv_search` function.
pub fn search_function(config: &Config) -> SearchFunction {
    SearchFunction::arxiv(config.retrieval.default_count, config.retrieval.max_count)
}

/// Build the argument bag for one CLI invocation. Absent flags stay absent.
pub fn cli_arguments(query: &str, count: Option<i64>, skip: Option<i64>) -> ArgumentBag {
    let mut args = ArgumentBag::new().with("query", query);
    if let Some(count) = count {
        args.insert("count", count);
    }
    if let Some(skip) = skip {
        args.insert("skip", skip);
    }
    args
}

/// Search the configured collection.
///
/// A blank query or a zero count returns no hits without opening the
/// database or checking the embedding provider.
pub async fn search_papers(
    config: &Config,
    args: &ArgumentBag,
    mode: SearchMode,
) -> Result<Vec<SearchHit>> {
    let function = search_function(config);
    match function.request(args)? {
        Some(request) if request.limit > 0 => {}
        _ => return Ok(Vec::new()),
    }

    if mode == SearchMode::Semantic && !config.embedding.is_enabled() {
        bail!("Semantic search requires embeddings. Set [embedding] provider in config, or use --mode keyword.");
    }

    let provider = match mode {
        SearchMode::Semantic => Some(embedding::create_provider(&config.embedding)?),
        SearchMode::Keyword => None,
    };

    db::with_pool(config, |pool| async move {
        let store = SqliteStore::new(pool, config.db.collection.clone(), config.embedding.dims)?;
        let hits = function
            .invoke(args, mode, &store, provider.as_deref())
            .await?;
        Ok::<_, anyhow::Error>(hits)
    })
    .await
}

/// CLI entry point: prints hits, or pretty JSON with `--json`.
pub async fn run_search(
    config: &Config,
    query: &str,
    count: Option<i64>,
    skip: Option<i64>,
    mode: &str,
    json: bool,
) -> Result<()> {
    let mode: SearchMode = mode.parse()?;
    let args = cli_arguments(query, count, skip);
    let hits = search_papers(config, &args, mode).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.title);
        println!("    id: {}", hit.name);
        println!("    link: {}", hit.link);
        println!("    abstract: \"{}\"", excerpt(&hit.value, 240));
        println!();
    }

    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
