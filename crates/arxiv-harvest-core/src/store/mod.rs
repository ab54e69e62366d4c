//! Storage abstraction for harvested records.
//!
//! The [`Store`] trait is the collection the enrichment pipeline commits
//! into and the retrieval function reads from. Records are keyed by
//! [`PaperRecord::id`]; writes are upserts.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PaperRecord, RetrievalRequest};

/// A stored record with its relevance score for one query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: PaperRecord,
    /// BM25-derived score (keyword) or cosine similarity (semantic).
    pub score: f64,
}

/// Summary counters for a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    pub records: i64,
    pub embedded: i64,
    pub newest_published: Option<DateTime<Utc>>,
}

/// Abstract record collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_collection_if_not_exists`](Store::create_collection_if_not_exists) | Idempotent collection setup |
/// | [`upsert_batch`](Store::upsert_batch) | Insert or update a batch, all-or-nothing |
/// | [`get_record`](Store::get_record) | Fetch one record by id |
/// | [`keyword_search`](Store::keyword_search) | Full-text search over title and abstract |
/// | [`vector_search`](Store::vector_search) | Cosine similarity over stored embeddings |
/// | [`stats`](Store::stats) | Record and embedding counts |
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the backing collection if it does not exist yet.
    async fn create_collection_if_not_exists(&self) -> Result<()>;

    /// Upsert every record in `records`, keyed by id.
    ///
    /// Either the whole batch is committed or none of it is.
    async fn upsert_batch(&self, records: &[PaperRecord]) -> Result<()>;

    async fn get_record(&self, id: &str) -> Result<Option<PaperRecord>>;

    /// Keyword search ranked best-first, honouring `limit` and `offset`.
    async fn keyword_search(&self, request: &RetrievalRequest) -> Result<Vec<ScoredRecord>>;

    /// Vector search ranked best-first, honouring `limit` and `offset`.
    /// Records without an embedding are never returned.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        request: &RetrievalRequest,
    ) -> Result<Vec<ScoredRecord>>;

    async fn stats(&self) -> Result<CollectionStats>;
}

/// Sort best-first (score desc, id asc) and apply offset/limit.
pub fn rank_and_page(
    mut scored: Vec<ScoredRecord>,
    request: &RetrievalRequest,
) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    scored
        .into_iter()
        .skip(request.offset)
        .take(request.limit)
        .collect()
}
