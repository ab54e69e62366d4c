//! Enrichment pipeline: embed records batch by batch and commit each batch.
//!
//! ```text
//! records ──batch(size)──▶ [b1] [b2] … [bn]
//!                           │
//!                           ├─ embed(abstracts)      one call per batch
//!                           ├─ len check             EmbeddingMismatch
//!                           ├─ vector i → record i   positional pairing
//!                           └─ upsert_batch          one transaction
//! ```
//!
//! Batches are processed strictly in order and never concurrently, so a
//! failure at batch `k` leaves exactly batches `1..k` committed. There is
//! no rollback of committed batches and no retry here.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use arxiv_harvest_core::batch::batch;
use arxiv_harvest_core::embedding::EmbeddingProvider;
use arxiv_harvest_core::error::{EnrichAborted, Error};
use arxiv_harvest_core::models::PaperRecord;
use arxiv_harvest_core::store::Store;

/// Progress of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub batches_committed: usize,
    pub records_committed: usize,
}

impl EnrichReport {
    fn abort(&self, source: Error) -> EnrichAborted {
        EnrichAborted {
            source,
            batches_committed: self.batches_committed,
            records_committed: self.records_committed,
        }
    }
}

/// Embed `records` in batches of `batch_size` and upsert each batch into `store`.
///
/// The collection is created (if absent) once, before the first batch.
/// `cancel` is checked before each batch and raced against the embedding
/// call; an upsert that has started is allowed to finish so the batch
/// stays atomic.
///
/// # Errors
///
/// [`EnrichAborted`] with the committed-so-far counters and one of:
/// `InvalidArgument` (zero batch size), `Embedding`, `EmbeddingMismatch`,
/// `Store`, or `Cancelled`.
pub async fn enrich_and_store(
    records: Vec<PaperRecord>,
    batch_size: usize,
    embedder: &dyn EmbeddingProvider,
    store: &dyn Store,
    cancel: &CancellationToken,
) -> Result<EnrichReport, EnrichAborted> {
    let mut report = EnrichReport::default();

    let batches = batch(records, batch_size).map_err(|e| report.abort(e))?;

    store
        .create_collection_if_not_exists()
        .await
        .map_err(|e| report.abort(Error::Store(e.into())))?;

    for mut chunk in batches {
        let batch_no = report.batches_committed + 1;
        if cancel.is_cancelled() {
            return Err(report.abort(Error::Cancelled));
        }

        let missing_ids = chunk.iter().filter(|r| !r.has_id()).count();
        if missing_ids > 0 {
            warn!(batch = batch_no, missing_ids, "records without id cannot be re-upserted");
        }

        let texts: Vec<String> = chunk.iter().map(|r| r.abstract_text.clone()).collect();
        let embedded = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = embedder.embed(&texts) => result.map_err(|e| Error::Embedding(e.into())),
        };
        let vectors = embedded.map_err(|e| report.abort(e))?;

        if vectors.len() != chunk.len() {
            return Err(report.abort(Error::EmbeddingMismatch {
                expected: chunk.len(),
                actual: vectors.len(),
            }));
        }

        for (record, vector) in chunk.iter_mut().zip(vectors) {
            record.embedding = Some(vector);
        }

        store
            .upsert_batch(&chunk)
            .await
            .map_err(|e| report.abort(Error::Store(e.into())))?;

        report.batches_committed += 1;
        report.records_committed += chunk.len();
        info!(
            batch = batch_no,
            size = chunk.len(),
            total_committed = report.records_committed,
            "committed batch"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arxiv_harvest_core::models::RetrievalRequest;
    use arxiv_harvest_core::store::memory::InMemoryStore;
    use arxiv_harvest_core::store::{CollectionStats, ScoredRecord};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn records(n: usize) -> Vec<PaperRecord> {
        (0..n)
            .map(|i| PaperRecord {
                id: format!("id-{}", i),
                title: format!("Title {}", i),
                abstract_text: format!("{}", i),
                published_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                link: format!("http://arxiv.org/abs/id-{}", i),
                authors: vec![],
                categories: BTreeSet::new(),
                pdf_link: None,
                embedding: None,
            })
            .collect()
    }

    /// Embeds the abstract "n" as `[n, 1]`; optionally drops a vector on one call.
    #[derive(Default)]
    struct NumberEmbedder {
        calls: AtomicUsize,
        short_on_call: Option<usize>,
        stall: Option<Duration>,
    }

    #[async_trait]
    impl EmbeddingProvider for NumberEmbedder {
        fn model_name(&self) -> &str {
            "number"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            let mut out: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| vec![t.parse::<f32>().unwrap(), 1.0])
                .collect();
            if self.short_on_call == Some(call) {
                out.pop();
            }
            Ok(out)
        }
    }

    /// Wraps an in-memory store and fails the n-th upsert.
    struct FailingStore {
        inner: InMemoryStore,
        fail_on: usize,
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn create_collection_if_not_exists(&self) -> anyhow::Result<()> {
            self.inner.create_collection_if_not_exists().await
        }
        async fn upsert_batch(&self, records: &[PaperRecord]) -> anyhow::Result<()> {
            if self.upserts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                anyhow::bail!("disk full");
            }
            self.inner.upsert_batch(records).await
        }
        async fn get_record(&self, id: &str) -> anyhow::Result<Option<PaperRecord>> {
            self.inner.get_record(id).await
        }
        async fn keyword_search(
            &self,
            request: &RetrievalRequest,
        ) -> anyhow::Result<Vec<ScoredRecord>> {
            self.inner.keyword_search(request).await
        }
        async fn vector_search(
            &self,
            query_vec: &[f32],
            request: &RetrievalRequest,
        ) -> anyhow::Result<Vec<ScoredRecord>> {
            self.inner.vector_search(query_vec, request).await
        }
        async fn stats(&self) -> anyhow::Result<CollectionStats> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_vectors_paired_by_position() {
        let store = InMemoryStore::new();
        let report = enrich_and_store(
            records(7),
            3,
            &NumberEmbedder::default(),
            &store,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.batches_committed, 3);
        assert_eq!(report.records_committed, 7);
        assert_eq!(
            store.upserted_batches(),
            vec![
                vec!["id-0", "id-1", "id-2"],
                vec!["id-3", "id-4", "id-5"],
                vec!["id-6"],
            ]
        );
        for i in 0..7 {
            let r = store.get_record(&format!("id-{}", i)).await.unwrap().unwrap();
            assert_eq!(r.embedding, Some(vec![i as f32, 1.0]));
        }
    }

    #[tokio::test]
    async fn test_mismatch_aborts_without_committing_batch() {
        let store = InMemoryStore::new();
        let embedder = NumberEmbedder {
            short_on_call: Some(2),
            ..NumberEmbedder::default()
        };
        let err = enrich_and_store(records(9), 3, &embedder, &store, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.source,
            Error::EmbeddingMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(err.batches_committed, 1);
        assert_eq!(err.records_committed, 3);
        assert_eq!(store.upserted_batches().len(), 1);
        assert!(store.get_record("id-3").await.unwrap().is_none());
        // Batch 3 is never attempted.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upsert_failure_reports_boundary() {
        let store = FailingStore {
            inner: InMemoryStore::new(),
            fail_on: 2,
            upserts: AtomicUsize::new(0),
        };
        let err = enrich_and_store(
            records(6),
            2,
            &NumberEmbedder::default(),
            &store,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.source, Error::Store(_)));
        assert_eq!(err.batches_committed, 1);
        assert_eq!(err.records_committed, 2);
        assert!(err.to_string().contains("at batch 2"));
        assert_eq!(store.inner.len(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_wrapped() {
        struct Broken;
        #[async_trait]
        impl EmbeddingProvider for Broken {
            fn model_name(&self) -> &str {
                "broken"
            }
            fn dims(&self) -> usize {
                1
            }
            async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
                anyhow::bail!("quota exceeded")
            }
        }

        let store = InMemoryStore::new();
        let err = enrich_and_store(records(2), 2, &Broken, &store, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.source, Error::Embedding(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let store = InMemoryStore::new();
        let err = enrich_and_store(
            records(2),
            0,
            &NumberEmbedder::default(),
            &store,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.source, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_empty_input_still_creates_collection() {
        let store = InMemoryStore::new();
        let report = enrich_and_store(
            Vec::new(),
            5,
            &NumberEmbedder::default(),
            &store,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report, EnrichReport::default());
        // Created: a direct upsert now succeeds.
        store.upsert_batch(&records(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_embedding_commits_nothing_more() {
        let store = InMemoryStore::new();
        let embedder = NumberEmbedder {
            stall: Some(Duration::from_secs(10)),
            ..NumberEmbedder::default()
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });

        // Batch 1 embeds by t=10s and commits; batch 2 is cut off at t=15s.
        let err = enrich_and_store(records(4), 2, &embedder, &store, &cancel)
            .await
            .unwrap_err();
        assert!(err.source.is_cancelled());
        assert_eq!(err.batches_committed, 1);
        assert_eq!(store.upserted_batches().len(), 1);
    }
}
