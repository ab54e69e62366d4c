//! One harvest → enrich → store run, and the `axh load` / `axh harvest` commands.
//!
//! [`harvest_and_store`] is the library entry point: it runs the
//! [`Harvester`] to completion, then feeds every harvested record through
//! [`enrich_and_store`]. The CLI wrappers add configuration, the SQLite
//! pool (closed on every exit path), and Ctrl-C cancellation.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use arxiv_harvest_core::embedding::EmbeddingProvider;
use arxiv_harvest_core::error::{EnrichAborted, HarvestAborted};
use arxiv_harvest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::enrich::enrich_and_store;
use crate::harvest::{ArxivClient, FeedSource, HarvestQuery, Harvester};
use crate::sqlite_store::SqliteStore;

/// Command-line overrides for one run. `None` falls back to the config file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub topic: String,
    pub total: i64,
    pub category: Option<String>,
    pub page_size: Option<i64>,
    pub batch_size: Option<usize>,
}

impl LoadOptions {
    pub fn harvest_query(&self, config: &Config) -> HarvestQuery {
        HarvestQuery {
            query: self.topic.clone(),
            category: self
                .category
                .clone()
                .unwrap_or_else(|| config.harvest.category.clone()),
            page_size: self.page_size.unwrap_or(config.harvest.page_size),
            total_results: self.total,
        }
    }

    pub fn batch_size(&self, config: &Config) -> usize {
        self.batch_size.unwrap_or(config.embedding.batch_size)
    }
}

/// Counters for a run, complete or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub pages_fetched: usize,
    pub fetched: usize,
    pub batches_committed: usize,
    pub records_committed: usize,
}

/// Why a run stopped early.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing was stored; the harvest itself failed.
    #[error(transparent)]
    Harvest(#[from] HarvestAborted),
    #[error("{source} after fetching {fetched} record(s)")]
    Enrich {
        pages_fetched: usize,
        fetched: usize,
        #[source]
        source: EnrichAborted,
    },
}

impl LoadError {
    /// How far the run got.
    pub fn summary(&self) -> LoadSummary {
        match self {
            LoadError::Harvest(e) => LoadSummary {
                pages_fetched: e.pages_fetched,
                fetched: e.records_fetched,
                ..LoadSummary::default()
            },
            LoadError::Enrich {
                pages_fetched,
                fetched,
                source,
            } => LoadSummary {
                pages_fetched: *pages_fetched,
                fetched: *fetched,
                batches_committed: source.batches_committed,
                records_committed: source.records_committed,
            },
        }
    }
}

/// Harvest `query`, then embed and store the records in batches of `batch_size`.
pub async fn harvest_and_store<S: FeedSource>(
    harvester: &Harvester<S>,
    query: &HarvestQuery,
    batch_size: usize,
    embedder: &dyn EmbeddingProvider,
    store: &dyn Store,
    cancel: &CancellationToken,
) -> std::result::Result<LoadSummary, LoadError> {
    let outcome = harvester.harvest(query, cancel).await?;
    let pages_fetched = outcome.pages_fetched;
    let fetched = outcome.records.len();
    info!(pages = pages_fetched, fetched, topic = %query.query, "harvest complete");

    let report = enrich_and_store(outcome.records, batch_size, embedder, store, cancel)
        .await
        .map_err(|source| LoadError::Enrich {
            pages_fetched,
            fetched,
            source,
        })?;

    Ok(LoadSummary {
        pages_fetched,
        fetched,
        batches_committed: report.batches_committed,
        records_committed: report.records_committed,
    })
}

/// Cancel `token` on Ctrl-C. Abort the returned handle once the run is over.
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next suspension point");
            token.cancel();
        }
    })
}

fn harvester(config: &Config) -> Result<Harvester<ArxivClient>> {
    Ok(Harvester::new(
        ArxivClient::new(&config.harvest)?,
        Duration::from_millis(config.harvest.request_delay_ms),
    ))
}

fn print_summary(summary: &LoadSummary) {
    println!("  Pages fetched:      {}", summary.pages_fetched);
    println!("  Fetched:            {}", summary.fetched);
    println!("  Batches committed:  {}", summary.batches_committed);
    println!("  Records committed:  {}", summary.records_committed);
}

/// `axh load`: harvest, embed, and store.
pub async fn run_load(config: &Config, opts: &LoadOptions) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("load requires an embedding provider; set [embedding].provider in the config");
    }
    let embedder = create_provider(&config.embedding)?;
    let harvester = harvester(config)?;
    let query = opts.harvest_query(config);
    let batch_size = opts.batch_size(config);

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());

    let outcome = db::with_pool(config, |pool| {
        let harvester = &harvester;
        let query = &query;
        let embedder = embedder.as_ref();
        let cancel = &cancel;
        async move {
            let store = SqliteStore::new(
                pool,
                config.db.collection.clone(),
                config.embedding.dims,
            )?;
            let outcome =
                harvest_and_store(harvester, query, batch_size, embedder, &store, cancel).await;
            Ok::<_, anyhow::Error>(outcome)
        }
    })
    .await;
    watcher.abort();

    match outcome? {
        Ok(summary) => {
            println!("Load complete for \"{}\" in {}:", query.query, query.category);
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            eprintln!("Load stopped: {}", e);
            print_summary(&e.summary());
            Err(e.into())
        }
    }
}

/// `axh harvest`: fetch only, print the records.
pub async fn run_harvest(config: &Config, opts: &LoadOptions, json: bool) -> Result<()> {
    let harvester = harvester(config)?;
    let query = opts.harvest_query(config);
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let result = harvester.harvest(&query, &cancel).await;
    watcher.abort();
    let records = result?.records;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, r) in records.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, r.title, r.id);
        println!("    published: {}", r.published_at.format("%Y-%m-%d"));
        println!("    authors: {}", r.authors.join(", "));
        println!("    link: {}", r.link);
        println!();
    }
    Ok(())
}
