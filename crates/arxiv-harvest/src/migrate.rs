use anyhow::Result;

use arxiv_harvest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Create the configured collection and its full-text index. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    db::with_pool(config, |pool| async move {
        let store = SqliteStore::new(pool, config.db.collection.clone(), config.embedding.dims)?;
        store.create_collection_if_not_exists().await
    })
    .await
}
