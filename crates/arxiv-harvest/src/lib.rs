//! # arXiv Harvest
//!
//! **Harvest arXiv abstracts, embed them in batches, and serve search over them.**
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  arXiv API  │──▶│   Enrich     │──▶│  SQLite   │
//! │  Harvester  │   │ batch+embed  │   │ FTS5+Vec  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │  (axh)   │       │  tools   │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **harvester** ([`harvest`]) pages through the arXiv query API,
//!    one request at a time with a fixed delay, and parses each Atom page
//!    ([`feed`]) into `PaperRecord`s.
//! 2. The **enrichment pipeline** ([`enrich`]) splits the records into
//!    fixed-size batches, embeds each batch's abstracts with one call to
//!    the configured provider ([`embedding`]), and upserts the batch.
//! 3. Records land in SQLite ([`sqlite_store`]): one row per record plus
//!    an FTS5 index over title and abstract.
//! 4. The `arxiv_search` function resolves a loose argument bag into a
//!    bounded request and runs keyword or semantic search. It is exposed
//!    by the CLI ([`search`]) and the HTTP tool server ([`server`]).
//!
//! ## Quick Start
//!
//! ```bash
//! axh init
//! axh load --topic RAG --total 50
//! axh search "retrieval augmented generation" --count 5
//! axh serve
//! ```
//!
//! The runtime-free pieces (batching, parameter resolution, the store
//! trait, the search function) live in `arxiv-harvest-core`.

pub mod config;
pub mod db;
pub mod embedding;
pub mod enrich;
pub mod feed;
pub mod get;
pub mod harvest;
pub mod load;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
