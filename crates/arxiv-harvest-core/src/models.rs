//! Core data models.
//!
//! These types flow through the harvest → enrich → store pipeline and
//! back out of the retrieval function.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One harvested paper.
///
/// Built once by the feed parser; `embedding` is the only field written
/// afterwards, by the enrichment pipeline, before the record reaches the
/// store. How each field is persisted is decided by
/// [`schema::RECORD_FIELDS`](crate::schema::RECORD_FIELDS), not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Last path segment of the canonical id URL (e.g. `2401.01234v2`).
    /// Empty when the feed entry carried no id.
    pub id: String,
    pub title: String,
    /// The text that gets embedded.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub published_at: DateTime<Utc>,
    /// Canonical abstract-page URL.
    pub link: String,
    pub authors: Vec<String>,
    pub categories: BTreeSet<String>,
    pub pdf_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl PaperRecord {
    /// Records without an id cannot be re-upserted deterministically.
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn is_enriched(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A bounded retrieval call against the store, built fresh per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub query_text: String,
    pub limit: usize,
    pub offset: usize,
}

impl RetrievalRequest {
    /// Build a request from resolved parameter values.
    ///
    /// Negative `limit` / `offset` clamp to zero. A blank query is an
    /// [`Error::InvalidArgument`].
    pub fn new(query_text: impl Into<String>, limit: i64, offset: i64) -> Result<Self> {
        let query_text = query_text.into();
        if query_text.trim().is_empty() {
            return Err(Error::invalid("query must not be empty"));
        }
        Ok(Self {
            query_text,
            limit: limit.max(0) as usize,
            offset: offset.max(0) as usize,
        })
    }
}

/// One retrieval result, shaped by the text-search roles of the mapping
/// table: `name` is the record key, `value` the embedded text, `link` the
/// canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub value: String,
    pub link: String,
    pub title: String,
    pub score: f64,
}
