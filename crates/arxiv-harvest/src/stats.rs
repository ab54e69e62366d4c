//! Collection statistics.
//!
//! `axh stats` prints how many records are stored, how many carry an
//! embedding, and the newest publication date, so a `load` run can be
//! checked at a glance.

use anyhow::Result;

use arxiv_harvest_core::store::{CollectionStats, Store};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the collection and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let stats = db::with_pool(config, |pool| async move {
        let store = SqliteStore::new(pool, config.db.collection.clone(), config.embedding.dims)?;
        store.stats().await
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("arXiv Harvest: Collection Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", config.db.collection);
    println!();
    println!("  Records:     {}", stats.records);
    println!("  Embedded:    {}", embedded_line(&stats));
    println!(
        "  Newest:      {}",
        stats
            .newest_published
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!();

    Ok(())
}

fn embedded_line(stats: &CollectionStats) -> String {
    let pct = if stats.records > 0 {
        (stats.embedded * 100) / stats.records
    } else {
        0
    };
    format!("{} / {} ({}%)", stats.embedded, stats.records, pct)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
