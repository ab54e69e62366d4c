//! The `arxiv_search` retrieval function.
//!
//! A [`SearchFunction`] bundles the function's discovery metadata (name,
//! description, declared parameters) with the hard defaults used when an
//! argument bag leaves `count` or `skip` unspecified. Invocation resolves
//! the bag into a [`RetrievalRequest`] via [`params::resolve`] and
//! delegates to a [`Store`].
//!
//! A missing or blank `query` short-circuits to an empty result without
//! touching the store or the embedding provider. An integer `query` is
//! searched as its decimal text.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{RetrievalRequest, SearchHit};
use crate::params::{self, ArgValue, ArgumentBag, ParamMeta, ParamType};
use crate::store::Store;

pub const ARXIV_SEARCH: &str = "arxiv_search";

/// How the store is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// FTS over title and abstract.
    Keyword,
    /// Cosine similarity between the query embedding and stored vectors.
    #[default]
    Semantic,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            other => Err(Error::invalid(format!(
                "unknown search mode '{}': expected keyword or semantic",
                other
            ))),
        }
    }
}

/// A retrieval function with its declared parameters and call-site defaults.
#[derive(Debug, Clone)]
pub struct SearchFunction {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamMeta>,
    /// Used for `count` when neither the bag nor the declared params supply an integer.
    pub default_count: i64,
    /// Upper bound on the resolved `count`.
    pub max_count: i64,
}

impl SearchFunction {
    /// The `arxiv_search` function with the given `count` hard default and cap.
    pub fn arxiv(default_count: i64, max_count: i64) -> Self {
        Self {
            name: ARXIV_SEARCH.to_string(),
            description:
                "Search for ArXiv abstracts for latest research in computer science topics."
                    .to_string(),
            params: vec![
                ParamMeta::new("query")
                    .description("Text to search for.")
                    .required(true)
                    .param_type(ParamType::String),
                ParamMeta::new("count")
                    .description("Number of results.")
                    .required(true)
                    .param_type(ParamType::Integer)
                    .default_value(3),
                ParamMeta::new("skip")
                    .description("Number of results to skip.")
                    .param_type(ParamType::Integer)
                    .default_value(0),
            ],
            default_count,
            max_count,
        }
    }

    /// Replace the declared parameters, keeping name and defaults.
    pub fn with_params(mut self, params: Vec<ParamMeta>) -> Self {
        self.params = params;
        self
    }

    /// Resolve an argument bag into a request.
    ///
    /// Returns `Ok(None)` when `query` is absent, blank, or neither a
    /// string nor an integer.
    pub fn request(&self, args: &ArgumentBag) -> Result<Option<RetrievalRequest>> {
        let query = match args.get("query") {
            ArgValue::String(q) if !q.trim().is_empty() => q.clone(),
            ArgValue::Integer(n) => n.to_string(),
            _ => return Ok(None),
        };
        let count = params::resolve(args, &self.params, "count", self.default_count)
            .min(self.max_count.max(0));
        let skip = params::resolve(args, &self.params, "skip", 0);
        RetrievalRequest::new(query, count, skip).map(Some)
    }

    /// Run the function against `store`.
    ///
    /// Semantic mode needs `embedder`; passing `None` there is an
    /// [`Error::InvalidArgument`].
    pub async fn invoke(
        &self,
        args: &ArgumentBag,
        mode: SearchMode,
        store: &dyn Store,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<Vec<SearchHit>> {
        let Some(request) = self.request(args)? else {
            return Ok(Vec::new());
        };
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let scored = match mode {
            SearchMode::Keyword => store
                .keyword_search(&request)
                .await
                .map_err(|e| Error::Store(e.into()))?,
            SearchMode::Semantic => {
                let embedder = embedder.ok_or_else(|| {
                    Error::invalid("semantic search requires an embedding provider")
                })?;
                let query_vec = embed_query(embedder, &request.query_text)
                    .await
                    .map_err(|e| Error::Embedding(e.into()))?;
                store
                    .vector_search(&query_vec, &request)
                    .await
                    .map_err(|e| Error::Store(e.into()))?
            }
        };

        Ok(scored
            .iter()
            .map(|s| SearchHit::from_record(&s.record, s.score))
            .collect())
    }

    /// Discovery document: name, description, and a JSON Schema for the parameters.
    pub fn definition(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(p.name.clone(), p.schema());
            if p.required {
                required.push(serde_json::Value::from(p.name.as_str()));
            }
        }
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperRecord;
    use crate::store::memory::InMemoryStore;
    use crate::store::{CollectionStats, ScoredRecord};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every request it receives and returns nothing.
    #[derive(Default)]
    struct RecordingStore {
        calls: AtomicUsize,
        requests: Mutex<Vec<RetrievalRequest>>,
    }

    #[async_trait]
    impl Store for RecordingStore {
        async fn create_collection_if_not_exists(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn upsert_batch(&self, _records: &[PaperRecord]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_record(&self, _id: &str) -> anyhow::Result<Option<PaperRecord>> {
            Ok(None)
        }
        async fn keyword_search(
            &self,
            request: &RetrievalRequest,
        ) -> anyhow::Result<Vec<ScoredRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            Ok(Vec::new())
        }
        async fn vector_search(
            &self,
            _query_vec: &[f32],
            request: &RetrievalRequest,
        ) -> anyhow::Result<Vec<ScoredRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            Ok(Vec::new())
        }
        async fn stats(&self) -> anyhow::Result<CollectionStats> {
            Ok(CollectionStats::default())
        }
    }

    struct Axis;

    #[async_trait]
    impl EmbeddingProvider for Axis {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn function() -> SearchFunction {
        SearchFunction::arxiv(2, 50)
    }

    #[tokio::test]
    async fn test_missing_query_skips_store() {
        let store = RecordingStore::default();
        let args = ArgumentBag::new().with("count", 5i64);
        let hits = function()
            .invoke(&args, SearchMode::Keyword, &store, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_query_skips_store_and_embedder() {
        let store = RecordingStore::default();
        let args = ArgumentBag::new().with("query", "   ");
        // No embedder supplied: reaching the semantic branch would error.
        let hits = function()
            .invoke(&args, SearchMode::Semantic, &store, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_integer_query_searched_as_text() {
        let store = RecordingStore::default();
        let args = ArgumentBag::new().with("query", 42i64);
        function()
            .invoke(&args, SearchMode::Keyword, &store, None)
            .await
            .unwrap();
        let requests = store.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query_text, "42");
    }

    #[test]
    fn test_non_text_query_resolves_to_nothing() {
        let args = ArgumentBag::new().with("query", serde_json::json!(["rag"]));
        assert!(function().request(&args).unwrap().is_none());
    }

    #[test]
    fn test_declared_count_default_applies() {
        let args = ArgumentBag::new().with("query", "agents");
        let req = function().request(&args).unwrap().unwrap();
        assert_eq!(req.limit, 3);
        assert_eq!(req.offset, 0);
    }

    #[test]
    fn test_hard_default_without_declared_params() {
        let f = function().with_params(Vec::new());
        let args = ArgumentBag::new().with("query", "agents");
        let req = f.request(&args).unwrap().unwrap();
        assert_eq!(req.limit, 2);
    }

    #[test]
    fn test_string_arguments_resolved() {
        let args = ArgumentBag::new()
            .with("query", "agents")
            .with("count", "5")
            .with("skip", "10");
        let req = function().request(&args).unwrap().unwrap();
        assert_eq!((req.limit, req.offset), (5, 10));
    }

    #[test]
    fn test_count_capped_and_negatives_clamped() {
        let args = ArgumentBag::new()
            .with("query", "agents")
            .with("count", 500i64)
            .with("skip", -4i64);
        let req = function().request(&args).unwrap().unwrap();
        assert_eq!((req.limit, req.offset), (50, 0));

        let args = ArgumentBag::new().with("query", "agents").with("count", -1i64);
        let req = function().request(&args).unwrap().unwrap();
        assert_eq!(req.limit, 0);
    }

    #[tokio::test]
    async fn test_keyword_invoke_passes_resolved_request() {
        let store = RecordingStore::default();
        let args = ArgumentBag::new()
            .with("query", "retrieval")
            .with("count", "4")
            .with("skip", 1i64);
        function()
            .invoke(&args, SearchMode::Keyword, &store, None)
            .await
            .unwrap();
        let requests = store.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query_text, "retrieval");
        assert_eq!((requests[0].limit, requests[0].offset), (4, 1));
    }

    #[tokio::test]
    async fn test_semantic_without_embedder_is_invalid() {
        let store = RecordingStore::default();
        let args = ArgumentBag::new().with("query", "agents");
        let err = function()
            .invoke(&args, SearchMode::Semantic, &store, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_semantic_hits_use_mapping_roles() {
        let store = InMemoryStore::new();
        store.create_collection_if_not_exists().await.unwrap();
        let record = PaperRecord {
            id: "2401.00001v1".to_string(),
            title: "Agents".to_string(),
            abstract_text: "We study agents.".to_string(),
            published_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            link: "http://arxiv.org/abs/2401.00001v1".to_string(),
            authors: vec!["A. Author".to_string()],
            categories: BTreeSet::from(["cs.AI".to_string()]),
            pdf_link: None,
            embedding: Some(vec![1.0, 0.0]),
        };
        store.upsert_batch(&[record]).await.unwrap();

        let args = ArgumentBag::new().with("query", "agents");
        let hits = function()
            .invoke(&args, SearchMode::Semantic, &store, Some(&Axis))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "2401.00001v1");
        assert_eq!(hits[0].value, "We study agents.");
        assert_eq!(hits[0].link, "http://arxiv.org/abs/2401.00001v1");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!("semantic".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert!("hybrid".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_definition_lists_required_params() {
        let def = function().definition();
        assert_eq!(def["name"], "arxiv_search");
        assert_eq!(def["parameters"]["required"], serde_json::json!(["query", "count"]));
        assert_eq!(def["parameters"]["properties"]["count"]["default"], 3);
    }
}
