//! Typed errors for harvesting, enrichment, and retrieval.
//!
//! Uses `thiserror` so callers can match on the failure kind and decide
//! whether a whole run is worth retrying. Collaborator traits ([`Store`],
//! [`EmbeddingProvider`]) stay on `anyhow`; their failures are boxed into
//! [`Error::Store`] and [`Error::Embedding`] at the pipeline boundary.
//!
//! [`Store`]: crate::store::Store
//! [`EmbeddingProvider`]: crate::embedding::EmbeddingProvider

use thiserror::Error;

/// Boxed collaborator error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure the harvest → enrich → store path can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller error (zero batch size, non-positive page size). Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The search API answered with a non-success status, or the request
    /// never completed (`status` is `None` for transport failures).
    #[error("search API request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The page payload could not be parsed into records.
    #[error("malformed feed: {0}")]
    Parse(String),

    /// The embedding collaborator returned the wrong number of vectors.
    #[error("embedding count mismatch: sent {expected} text(s), received {actual} vector(s)")]
    EmbeddingMismatch { expected: usize, actual: usize },

    /// The embedding collaborator itself failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] BoxError),

    /// The store collaborator failed (collection create or batch upsert).
    #[error("store error: {0}")]
    Store(#[source] BoxError),

    /// Cooperative cancellation observed at a suspension point.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A harvest that stopped before its request budget was spent.
///
/// Carries how far the run got so the caller can resume with an adjusted
/// offset or total.
#[derive(Debug, Error)]
#[error("harvest aborted after {pages_fetched} page(s) ({records_fetched} record(s)): {source}")]
pub struct HarvestAborted {
    #[source]
    pub source: Error,
    pub pages_fetched: usize,
    pub records_fetched: usize,
}

/// An enrichment run that stopped at a batch boundary.
///
/// Batches are committed strictly in order, so the first
/// `records_committed` input records are stored and everything after
/// them is not.
#[derive(Debug, Error)]
#[error(
    "enrichment aborted at batch {} after committing {batches_committed} batch(es) ({records_committed} record(s)): {source}",
    .batches_committed + 1
)]
pub struct EnrichAborted {
    #[source]
    pub source: Error,
    pub batches_committed: usize,
    pub records_committed: usize,
}
