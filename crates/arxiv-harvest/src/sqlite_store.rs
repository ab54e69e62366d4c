//! SQLite-backed [`Store`] implementation.
//!
//! The record table is named by the configured collection and its
//! columns come from [`RECORD_FIELDS`]; a companion FTS5 table
//! `{collection}_fts` indexes the full-text fields. Each
//! [`upsert_batch`](Store::upsert_batch) runs in one transaction that
//! writes both tables.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::{Row, SqlitePool};

use arxiv_harvest_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use arxiv_harvest_core::models::{PaperRecord, RetrievalRequest};
use arxiv_harvest_core::schema::{
    full_text_keys, key_mapping, mapping, FieldValue, RecordField, StorageKind, RECORD_FIELDS,
};
use arxiv_harvest_core::store::{rank_and_page, CollectionStats, ScoredRecord, Store};

use crate::config::is_valid_identifier;

/// SQLite implementation of the [`Store`] trait for one collection.
pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    dims: Option<usize>,
}

impl SqliteStore {
    /// `dims`, when set, is enforced on every embedded record at upsert.
    pub fn new(pool: SqlitePool, collection: impl Into<String>, dims: Option<usize>) -> Result<Self> {
        let collection = collection.into();
        if !is_valid_identifier(&collection) {
            bail!("invalid collection name: '{}'", collection);
        }
        Ok(Self {
            pool,
            collection,
            dims,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn fts_table(&self) -> String {
        format!("{}_fts", self.collection)
    }

    fn columns() -> String {
        RECORD_FIELDS
            .iter()
            .map(|m| m.storage_key)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_table_sql(&self) -> String {
        let columns: Vec<String> = RECORD_FIELDS
            .iter()
            .map(|m| {
                let ty = match m.kind {
                    StorageKind::Key => "TEXT PRIMARY KEY",
                    StorageKind::Text | StorageKind::TextList => "TEXT NOT NULL",
                    StorageKind::OptionalText => "TEXT",
                    StorageKind::Timestamp => "INTEGER NOT NULL",
                    StorageKind::Vector => "BLOB",
                };
                format!("{} {}", m.storage_key, ty)
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.collection,
            columns.join(", ")
        )
    }

    fn create_fts_sql(&self) -> String {
        format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5({} UNINDEXED, {})",
            self.fts_table(),
            key_mapping().storage_key,
            full_text_keys().join(", ")
        )
    }

    fn upsert_sql(&self) -> String {
        let key = key_mapping().storage_key;
        let placeholders = vec!["?"; RECORD_FIELDS.len()].join(", ");
        let updates: Vec<String> = RECORD_FIELDS
            .iter()
            .filter(|m| m.kind != StorageKind::Key)
            .map(|m| format!("{0} = excluded.{0}", m.storage_key))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            self.collection,
            Self::columns(),
            placeholders,
            key,
            updates.join(", ")
        )
    }

    fn check_dims(&self, records: &[PaperRecord]) -> Result<()> {
        let Some(dims) = self.dims else {
            return Ok(());
        };
        for r in records {
            if let Some(v) = &r.embedding {
                if v.len() != dims {
                    bail!(
                        "record '{}' has a {}-dim embedding, collection expects {}",
                        r.id,
                        v.len(),
                        dims
                    );
                }
            }
        }
        Ok(())
    }
}

/// Bind every mapped field of `record`, in [`RECORD_FIELDS`] order.
fn bind_record<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    record: &PaperRecord,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    for m in RECORD_FIELDS {
        query = match record.field_value(m.field) {
            FieldValue::Text(s) => query.bind(s.to_string()),
            FieldValue::OptionalText(s) => query.bind(s.map(str::to_string)),
            FieldValue::Timestamp(ts) => query.bind(ts),
            FieldValue::TextList(items) => query.bind(serde_json::to_string(&items)?),
            FieldValue::Vector(v) => query.bind(v.map(vec_to_blob)),
        };
    }
    Ok(query)
}

fn text_list(row: &SqliteRow, key: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(key)?;
    serde_json::from_str(&raw).with_context(|| format!("column '{}' is not a JSON list", key))
}

fn record_from_row(row: &SqliteRow) -> Result<PaperRecord> {
    let key = |f: RecordField| mapping(f).storage_key;

    let published: i64 = row.try_get(key(RecordField::Published))?;
    let published_at = DateTime::from_timestamp(published, 0)
        .with_context(|| format!("published timestamp out of range: {}", published))?;
    let embedding: Option<Vec<u8>> = row.try_get(key(RecordField::Embedding))?;

    Ok(PaperRecord {
        id: row.try_get(key(RecordField::Id))?,
        title: row.try_get(key(RecordField::Title))?,
        abstract_text: row.try_get(key(RecordField::Abstract))?,
        published_at,
        link: row.try_get(key(RecordField::Link))?,
        authors: text_list(row, key(RecordField::Authors))?,
        categories: text_list(row, key(RecordField::Categories))?
            .into_iter()
            .collect(),
        pdf_link: row.try_get(key(RecordField::PdfLink))?,
        embedding: embedding.map(|b| blob_to_vec(&b)),
    })
}

/// Turn free text into an FTS5 query: every word is quoted and the words
/// are OR-ed, so user punctuation never reaches the FTS5 parser.
fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_collection_if_not_exists(&self) -> Result<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .with_context(|| format!("creating collection '{}'", self.collection))?;
        sqlx::query(&self.create_fts_sql())
            .execute(&self.pool)
            .await
            .with_context(|| format!("creating index '{}'", self.fts_table()))?;
        Ok(())
    }

    async fn upsert_batch(&self, records: &[PaperRecord]) -> Result<()> {
        self.check_dims(records)?;

        let upsert = self.upsert_sql();
        let fts = self.fts_table();
        let fts_keys = full_text_keys();
        let fts_delete = format!("DELETE FROM {} WHERE {} = ?", fts, key_mapping().storage_key);
        let fts_insert = format!(
            "INSERT INTO {} ({}, {}) VALUES (?, {})",
            fts,
            key_mapping().storage_key,
            fts_keys.join(", "),
            vec!["?"; fts_keys.len()].join(", ")
        );

        let mut tx = self.pool.begin().await?;

        for record in records {
            bind_record(sqlx::query(&upsert), record)?
                .execute(&mut *tx)
                .await?;

            sqlx::query(&fts_delete)
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;

            let mut insert = sqlx::query(&fts_insert).bind(&record.id);
            for m in RECORD_FIELDS.iter().filter(|m| m.full_text) {
                let text = record.field_value(m.field).as_text().unwrap_or_default().to_string();
                insert = insert.bind(text);
            }
            insert.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<Option<PaperRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            Self::columns(),
            self.collection,
            key_mapping().storage_key
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn keyword_search(&self, request: &RetrievalRequest) -> Result<Vec<ScoredRecord>> {
        let Some(match_expr) = fts_query(&request.query_text) else {
            return Ok(Vec::new());
        };
        let key = key_mapping().storage_key;
        let fts = self.fts_table();
        let columns: Vec<String> = RECORD_FIELDS
            .iter()
            .map(|m| format!("t.{}", m.storage_key))
            .collect();
        let sql = format!(
            r#"
            SELECT {cols}, {fts}.rank AS rank
            FROM {fts}
            JOIN {table} t ON t.{key} = {fts}.{key}
            WHERE {fts} MATCH ?
            ORDER BY {fts}.rank, t.{key}
            LIMIT ? OFFSET ?
            "#,
            cols = columns.join(", "),
            fts = fts,
            table = self.collection,
            key = key,
        );

        let rows = sqlx::query(&sql)
            .bind(match_expr)
            .bind(request.limit as i64)
            .bind(request.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let rank: f64 = row.try_get("rank")?;
                Ok(ScoredRecord {
                    record: record_from_row(row)?,
                    score: -rank,
                })
            })
            .collect()
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        request: &RetrievalRequest,
    ) -> Result<Vec<ScoredRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IS NOT NULL",
            Self::columns(),
            self.collection,
            mapping(RecordField::Embedding).storage_key
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(row)?;
            let similarity = record
                .embedding
                .as_deref()
                .map(|v| cosine_similarity(query_vec, v) as f64)
                .unwrap_or_default();
            scored.push(ScoredRecord {
                record,
                score: similarity,
            });
        }

        Ok(rank_and_page(scored, request))
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let sql = format!(
            "SELECT COUNT(*) AS records, COUNT({}) AS embedded, MAX({}) AS newest FROM {}",
            mapping(RecordField::Embedding).storage_key,
            mapping(RecordField::Published).storage_key,
            self.collection
        );
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let newest: Option<i64> = row.try_get("newest")?;
        Ok(CollectionStats {
            records: row.try_get("records")?,
            embedded: row.try_get("embedded")?,
            newest_published: newest.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    async fn open(dims: Option<usize>) -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(tmp.path().join("test.sqlite"))
                    .create_if_missing(true),
            )
            .await
            .unwrap();
        let store = SqliteStore::new(pool, "papers", dims).unwrap();
        store.create_collection_if_not_exists().await.unwrap();
        (tmp, store)
    }

    fn record(id: &str, title: &str, abstract_text: &str, embedding: Option<Vec<f32>>) -> PaperRecord {
        PaperRecord {
            id: id.to_string(),
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            published_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            link: format!("http://arxiv.org/abs/{}", id),
            authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
            categories: BTreeSet::from(["cs.AI".to_string(), "cs.CL".to_string()]),
            pdf_link: Some(format!("http://arxiv.org/pdf/{}", id)),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_rejects_unsafe_collection() {
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        assert!(SqliteStore::new(pool, "x; DROP TABLE y", None).is_err());
    }

    #[tokio::test]
    async fn test_upsert_sql_updates_every_non_key_column() {
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let store = SqliteStore::new(pool, "papers", None).unwrap();
        let sql = store.upsert_sql();
        assert!(sql.contains("ON CONFLICT(id) DO UPDATE SET"));
        assert!(sql.contains("abstract = excluded.abstract"));
        assert!(sql.contains("embedding = excluded.embedding"));
        assert!(!sql.contains("id = excluded.id"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (_tmp, store) = open(None).await;
        store.create_collection_if_not_exists().await.unwrap();
        assert_eq!(store.stats().await.unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let (_tmp, store) = open(Some(3)).await;
        let original = record("2401.00001v2", "Agents", "We study agents.", Some(vec![0.5, -1.0, 2.0]));
        store.upsert_batch(std::slice::from_ref(&original)).await.unwrap();

        let loaded = store.get_record("2401.00001v2").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.get_record("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let (_tmp, store) = open(None).await;
        store
            .upsert_batch(&[record("a", "Old title", "old words", None)])
            .await
            .unwrap();
        store
            .upsert_batch(&[record("a", "New title", "fresh words", Some(vec![1.0]))])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.embedded, 1);

        let req = RetrievalRequest::new("old", 10, 0).unwrap();
        assert!(store.keyword_search(&req).await.unwrap().is_empty());
        let req = RetrievalRequest::new("fresh", 10, 0).unwrap();
        assert_eq!(store.keyword_search(&req).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dims_mismatch_commits_nothing() {
        let (_tmp, store) = open(Some(2)).await;
        let batch = vec![
            record("a", "A", "alpha", Some(vec![1.0, 0.0])),
            record("b", "B", "beta", Some(vec![1.0, 0.0, 0.0])),
        ];
        let err = store.upsert_batch(&batch).await.unwrap_err();
        assert!(err.to_string().contains("3-dim"));
        assert_eq!(store.stats().await.unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_keyword_search_pages() {
        let (_tmp, store) = open(None).await;
        store
            .upsert_batch(&[
                record("a", "Graph retrieval", "retrieval over graphs", None),
                record("b", "Retrieval agents", "agents that use retrieval", None),
                record("c", "Protein folding", "structure prediction", None),
            ])
            .await
            .unwrap();

        let all = store
            .keyword_search(&RetrievalRequest::new("retrieval", 10, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let second = store
            .keyword_search(&RetrievalRequest::new("retrieval", 1, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].record.id, all[1].record.id);
    }

    #[tokio::test]
    async fn test_keyword_search_tolerates_fts_syntax() {
        let (_tmp, store) = open(None).await;
        store
            .upsert_batch(&[record("a", "Retrieval", "augmented generation", None)])
            .await
            .unwrap();
        let req = RetrievalRequest::new("\"retrieval\" AND (NEAR:", 10, 0).unwrap();
        let hits = store.keyword_search(&req).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_similarity() {
        let (_tmp, store) = open(Some(2)).await;
        store
            .upsert_batch(&[
                record("a", "A", "alpha", Some(vec![1.0, 0.0])),
                record("b", "B", "beta", Some(vec![0.0, 1.0])),
                record("c", "C", "gamma", None),
            ])
            .await
            .unwrap();
        let req = RetrievalRequest::new("q", 10, 0).unwrap();
        let hits = store.vector_search(&[0.1, 0.9], &req).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(fts_query("graph  rag").as_deref(), Some("\"graph\" OR \"rag\""));
        assert_eq!(fts_query("\"\"  "), None);
    }
}
