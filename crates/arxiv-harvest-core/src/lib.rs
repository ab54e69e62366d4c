//! # arXiv Harvest Core
//!
//! Runtime-free logic for the arXiv harvester: record models, the
//! field-to-storage mapping table, fixed-size batching, the retrieval
//! parameter resolver, the store and embedding abstractions, and the
//! `arxiv_search` retrieval function.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! harvester, the SQLite store, and the embedding backends live in the
//! `arxiv-harvest` app crate.

pub mod batch;
pub mod embedding;
pub mod error;
pub mod models;
pub mod params;
pub mod retrieval;
pub mod schema;
pub mod store;

pub use error::{EnrichAborted, Error, HarvestAborted, Result};
