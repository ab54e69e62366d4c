//! Paginated, rate-limited harvesting from the arXiv query API.
//!
//! A [`Harvester`] walks the result list of one query page by page:
//!
//! ```text
//! start=0    max_results=min(page, remaining)   ── request 1
//!            ... request_delay ...
//! start=100  max_results=min(page, remaining)   ── request 2
//!            ... request_delay ...
//! start=200  max_results=remaining              ── request 3 (no delay after)
//! ```
//!
//! The page size is clamped to [`API_MAX_RESULTS`]. The total budget is
//! spent by request count: a short page (upstream exhausted) is kept as is
//! and never topped up with another request.
//!
//! Both suspension points, the page request and the inter-page delay,
//! race the caller's [`CancellationToken`].

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use arxiv_harvest_core::error::{Error, HarvestAborted, Result};
use arxiv_harvest_core::models::PaperRecord;

use crate::config::HarvestConfig;
use crate::feed::{parse_feed, FeedPage};

/// The most records the arXiv API returns for one request.
pub const API_MAX_RESULTS: i64 = 2000;

/// What to harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestQuery {
    /// Matched as an exact phrase against all fields.
    pub query: String,
    /// arXiv category filter, e.g. `cs.AI`.
    pub category: String,
    pub page_size: i64,
    /// Upper bound on records requested across all pages.
    pub total_results: i64,
}

/// One page request against the query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub category: String,
    pub start: i64,
    pub max_results: i64,
}

impl PageRequest {
    /// Build the request URL, sorted by last update, newest first.
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}?search_query=all:%22{}%22+AND+cat:{}&start={}&max_results={}&sortBy=lastUpdatedDate&sortOrder=descending",
            base_url,
            uri_encode(&self.query),
            uri_encode(&self.category),
            self.start,
            self.max_results
        )
    }
}

/// RFC 3986 percent-encoding (unreserved characters pass through).
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Where pages come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse one page.
    ///
    /// Non-success responses map to [`Error::Network`]; unparseable bodies
    /// to [`Error::Parse`].
    async fn fetch_page(&self, request: &PageRequest) -> Result<FeedPage>;
}

/// [`FeedSource`] over HTTP with reqwest.
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(config: &HarvestConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("axh/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for ArxivClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<FeedPage> {
        let url = request.to_url(&self.base_url);
        debug!(%url, "requesting page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await.map_err(|e| Error::Network {
            status: Some(status.as_u16()),
            message: format!("reading body: {}", e),
        })?;
        parse_feed(&body)
    }
}

/// A completed harvest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestOutcome {
    /// Records in API order.
    pub records: Vec<PaperRecord>,
    /// Requests that returned a parsed page.
    pub pages_fetched: usize,
}

/// Sequential page walker with a fixed courtesy delay between requests.
pub struct Harvester<S> {
    source: S,
    delay: Duration,
}

impl<S: FeedSource> Harvester<S> {
    pub fn new(source: S, delay: Duration) -> Self {
        Self { source, delay }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Harvest up to `query.total_results` records, in API order.
    ///
    /// # Errors
    ///
    /// [`HarvestAborted`] carrying the failure and how many pages and
    /// records were fetched before it: `InvalidArgument` for a
    /// non-positive page size (no request is sent), `Network` / `Parse`
    /// from the source, `Cancelled` when `cancel` fires.
    pub async fn harvest(
        &self,
        query: &HarvestQuery,
        cancel: &CancellationToken,
    ) -> std::result::Result<HarvestOutcome, HarvestAborted> {
        let mut records: Vec<PaperRecord> = Vec::new();
        let mut pages = 0usize;
        let abort = |source: Error, pages: usize, records: &[PaperRecord]| HarvestAborted {
            source,
            pages_fetched: pages,
            records_fetched: records.len(),
        };

        if query.page_size <= 0 {
            return Err(abort(
                Error::invalid(format!("page size must be > 0, got {}", query.page_size)),
                0,
                &records,
            ));
        }
        let page_size = query.page_size.min(API_MAX_RESULTS);

        let mut offset = 0i64;
        let mut remaining = query.total_results;

        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(abort(Error::Cancelled, pages, &records));
            }

            let request = PageRequest {
                query: query.query.clone(),
                category: query.category.clone(),
                start: offset,
                max_results: page_size.min(remaining),
            };

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                page = self.source.fetch_page(&request) => page,
            };
            let page = fetched.map_err(|e| abort(e, pages, &records))?;

            pages += 1;
            if let Some(total) = page.total_available {
                debug!(total, "upstream matches");
            }
            info!(
                page = pages,
                start = request.start,
                requested = request.max_results,
                received = page.records.len(),
                "fetched page"
            );
            records.extend(page.records);

            offset += request.max_results;
            remaining -= request.max_results;

            if remaining > 0 && !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(abort(Error::Cancelled, pages, &records));
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        Ok(HarvestOutcome {
            records,
            pages_fetched: pages,
        })
    }
}
