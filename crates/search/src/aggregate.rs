//! Multi-page fetch-and-merge against the upstream search API

use crate::client::{SearchClient, SearchOptions, SearchPage};
use crate::filter::filter_lines;
use crate::keys::{complete_fingerprint, page_fingerprint};
use crate::model::{CompleteAggregate, ResultSet};
use crate::normalize::normalize_page;
use crate::snippet::SnippetExtractor;
use cache::Cache;
use error::{Result, ScoutError};
use observability::{Event, Level, Observer};
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pages fetched per query at most, whatever upstream claims
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// Result of one aggregation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub hits: ResultSet,
    /// Upstream-reported total hit count (from the last page fetched)
    pub total_count: u64,
    pub pages_scanned: u32,
    /// Pages that had to be fetched from upstream
    pub api_requests: u32,
    pub regex_filtered: bool,
}

impl Aggregation {
    /// Every page came from cache
    pub fn fully_cached(&self) -> bool {
        self.pages_scanned > 0 && self.api_requests == 0
    }
}

/// Drives the page loop: cache read-through, normalize, merge, persist
pub struct Aggregator {
    client: Arc<dyn SearchClient>,
    cache: Arc<Cache>,
    extractor: Arc<dyn SnippetExtractor>,
    observer: Arc<dyn Observer>,
    max_pages: u32,
}

impl Aggregator {
    pub fn new(
        client: Arc<dyn SearchClient>,
        cache: Arc<Cache>,
        extractor: Arc<dyn SnippetExtractor>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            client,
            cache,
            extractor,
            observer,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Override the page cap; values below 1 are raised to 1
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Fetch and merge pages sequentially until upstream runs out of pages or the cap
    /// is reached. A non-empty result is cached under the query's complete fingerprint.
    ///
    /// `line_filter`, when given, is applied to the merged set before it is cached.
    pub async fn aggregate(
        &self,
        query: &str,
        options: &SearchOptions,
        line_filter: Option<&Regex>,
        cancel: &CancellationToken,
    ) -> Result<Aggregation> {
        let mut aggregation = Aggregation::default();
        let mut page = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(ScoutError::Cancelled);
            }

            let (results, from_cache) = self.load_page(query, page, options, cancel).await?;
            aggregation.pages_scanned += 1;
            if !from_cache {
                aggregation.api_requests += 1;
            }

            let page_hits =
                normalize_page(&results.hits.hits, self.extractor.as_ref(), self.observer.as_ref());
            aggregation.hits.merge(page_hits);
            aggregation.total_count = results.facets.count;

            if page >= results.facets.pages || page >= self.max_pages {
                break;
            }
            page += 1;
        }

        if let Some(pattern) = line_filter {
            aggregation.hits = filter_lines(&aggregation.hits, pattern);
            aggregation.regex_filtered = true;
        }

        if !aggregation.hits.is_empty() {
            self.store_complete(query, &aggregation);
        }

        Ok(aggregation)
    }

    async fn load_page(
        &self,
        query: &str,
        page: u32,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<(SearchPage, bool)> {
        let key = page_fingerprint(query, page, options);

        let cached = self.cache.get::<SearchPage>(&key);
        self.observer.record(&Event::CacheOperation {
            cache_key: key.to_string(),
            hit: cached.is_some(),
            query: query.to_string(),
        });
        if let Some(results) = cached {
            return Ok((results, true));
        }

        let results = tokio::select! {
            _ = cancel.cancelled() => return Err(ScoutError::Cancelled),
            results = self.client.fetch_page(query, page, options) => results?,
        };

        if let Err(e) = self.cache.put(&key, &results, query) {
            self.observer.log(
                Level::Warn,
                "cache",
                &format!("Cache write error: {}", e),
                json!({ "cache_key": key.to_string(), "page": page }),
            );
        }

        Ok((results, false))
    }

    fn store_complete(&self, query: &str, aggregation: &Aggregation) {
        let key = complete_fingerprint(query);
        let complete = CompleteAggregate {
            hits: aggregation.hits.clone(),
            count: aggregation.total_count,
        };

        if let Err(e) = self.cache.put(&key, &complete, query) {
            self.observer.log(
                Level::Warn,
                "cache",
                &format!("Failed to cache complete results: {}", e),
                json!({ "cache_key": key.to_string() }),
            );
        }
    }
}

/// The complete aggregate a previous search cached for `query`, if still live
pub fn load_complete(cache: &Cache, query: &str) -> Option<CompleteAggregate> {
    cache.get(&complete_fingerprint(query))
}
