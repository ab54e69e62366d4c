//! Record retrieval by arXiv id.
//!
//! Used by `axh get <id>`.

use anyhow::{bail, Result};

use arxiv_harvest_core::models::PaperRecord;
use arxiv_harvest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Fetch one stored record, embedding included.
pub async fn get_record(config: &Config, id: &str) -> Result<PaperRecord> {
    let found = db::with_pool(config, |pool| async move {
        let store = SqliteStore::new(pool, config.db.collection.clone(), config.embedding.dims)?;
        store.get_record(id).await
    })
    .await?;

    match found {
        Some(record) => Ok(record),
        None => bail!("record not found: {}", id),
    }
}

/// CLI entry point for `axh get <id>`.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let record = get_record(config, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Record ---");
    println!("id:          {}", record.id);
    println!("title:       {}", record.title);
    println!("published:   {}", record.published_at.to_rfc3339());
    println!("link:        {}", record.link);
    if let Some(ref pdf) = record.pdf_link {
        println!("pdf:         {}", pdf);
    }
    println!("authors:     {}", record.authors.join(", "));
    println!(
        "categories:  {}",
        record.categories.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    match record.embedding {
        Some(ref v) => println!("embedding:   {} dims", v.len()),
        None => println!("embedding:   (none)"),
    }
    println!();

    println!("--- Abstract ---");
    println!("{}", record.abstract_text);

    Ok(())
}
