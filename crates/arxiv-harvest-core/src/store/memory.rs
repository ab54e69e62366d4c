//! In-memory [`Store`] implementation for testing and embedding in other tools.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors;
//! keyword search counts query-term hits in title and abstract.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{PaperRecord, RetrievalRequest};

use super::{rank_and_page, CollectionStats, ScoredRecord, Store};

/// In-memory store keyed by record id.
///
/// Upserts fail until [`create_collection_if_not_exists`](Store::create_collection_if_not_exists)
/// has been called, mirroring a real backend without its table.
#[derive(Default)]
pub struct InMemoryStore {
    created: RwLock<bool>,
    records: RwLock<BTreeMap<String, PaperRecord>>,
    upserts: RwLock<Vec<Vec<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every committed batch, in commit order.
    pub fn upserted_batches(&self) -> Vec<Vec<String>> {
        self.upserts.read().unwrap().clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_collection_if_not_exists(&self) -> Result<()> {
        *self.created.write().unwrap() = true;
        Ok(())
    }

    async fn upsert_batch(&self, records: &[PaperRecord]) -> Result<()> {
        if !*self.created.read().unwrap() {
            bail!("collection does not exist");
        }
        let mut stored = self.records.write().unwrap();
        for r in records {
            stored.insert(r.id.clone(), r.clone());
        }
        self.upserts
            .write()
            .unwrap()
            .push(records.iter().map(|r| r.id.clone()).collect());
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<Option<PaperRecord>> {
        Ok(self.records.read().unwrap().get(id).cloned())
    }

    async fn keyword_search(&self, request: &RetrievalRequest) -> Result<Vec<ScoredRecord>> {
        let query_lower = request.query_text.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.records.read().unwrap();
        let scored = records
            .values()
            .filter_map(|r| {
                let text = format!("{} {}", r.title, r.abstract_text).to_lowercase();
                let matches = terms.iter().filter(|t| text.contains(*t)).count();
                (matches > 0).then(|| ScoredRecord {
                    record: r.clone(),
                    score: matches as f64,
                })
            })
            .collect();
        Ok(rank_and_page(scored, request))
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        request: &RetrievalRequest,
    ) -> Result<Vec<ScoredRecord>> {
        let records = self.records.read().unwrap();
        let scored = records
            .values()
            .filter_map(|r| {
                let v = r.embedding.as_deref()?;
                Some(ScoredRecord {
                    record: r.clone(),
                    score: cosine_similarity(query_vec, v) as f64,
                })
            })
            .collect();
        Ok(rank_and_page(scored, request))
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let records = self.records.read().unwrap();
        Ok(CollectionStats {
            records: records.len() as i64,
            embedded: records.values().filter(|r| r.is_enriched()).count() as i64,
            newest_published: records.values().map(|r| r.published_at).max(),
        })
    }
}
