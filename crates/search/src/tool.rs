//! Caller-facing search operation

use crate::aggregate::{Aggregation, Aggregator};
use crate::client::SearchOptions;
use crate::filter::compile_line_filter;
use crate::format::{render, OutputMode, NO_RESULTS};
use error::{Result, ScoutError};
use observability::{Event, SearchRecord};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// One search request
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub options: SearchOptions,
    /// Regex applied to matched line text after aggregation
    pub line_filter: Option<String>,
    pub output: OutputMode,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

pub struct SearchTool {
    aggregator: Aggregator,
}

impl SearchTool {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }

    /// Run a search and render it in the requested output mode.
    ///
    /// Input problems (empty query, unusable filter) are reported before any upstream
    /// request. An empty result renders as [`NO_RESULTS`].
    pub async fn search(&self, params: &SearchParams, cancel: &CancellationToken) -> Result<String> {
        let start = Instant::now();
        self.aggregator.observer().record(&Event::SearchStart {
            query: params.query.clone(),
        });

        let outcome = self.run(params, cancel).await;

        let mut record = SearchRecord {
            query: params.query.clone(),
            use_regex: params.options.use_regex,
            case_sensitive: params.options.case_sensitive,
            whole_words: params.options.whole_words,
            repo_filter: params.options.repo_filter.clone(),
            path_filter: params.options.path_filter.clone(),
            lang_filter: params.options.lang_filter.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        };
        match &outcome {
            Ok(aggregation) => {
                record.success = true;
                record.result_count = aggregation.total_count;
                record.file_count = aggregation.hits.file_count();
                record.line_count = aggregation.hits.line_count();
                record.cache_hit = aggregation.fully_cached();
                record.pages_scanned = aggregation.pages_scanned;
                record.api_requests = aggregation.api_requests;
                record.regex_filtered = aggregation.regex_filtered;
            }
            Err(e) => record.error = Some(e.to_string()),
        }
        self.aggregator.observer().record(&Event::SearchComplete(record));

        let aggregation = outcome?;
        if aggregation.hits.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        render(&aggregation.hits, params.output)
    }

    async fn run(&self, params: &SearchParams, cancel: &CancellationToken) -> Result<Aggregation> {
        if params.query.trim().is_empty() {
            return Err(ScoutError::validation("query parameter is required"));
        }
        let line_filter = params
            .line_filter
            .as_deref()
            .map(compile_line_filter)
            .transpose()?;

        self.aggregator
            .aggregate(&params.query, &params.options, line_filter.as_ref(), cancel)
            .await
    }
}
