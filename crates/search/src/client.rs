//! Upstream search API client

use async_trait::async_trait;
use config::SearchConfig;
use error::{Result, ScoutError};
use observability::{ApiRequestRecord, Event, Observer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Wire Types
// ============================================================================

/// One page of upstream results, stored verbatim in the page cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub hits: HitList,
    #[serde(default)]
    pub facets: Facets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitList {
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub repo: RawField,
    pub path: RawField,
    #[serde(default)]
    pub content: SnippetField,
}

impl RawHit {
    pub fn new(repo: &str, path: &str, snippet: &str) -> Self {
        Self {
            repo: RawField {
                raw: repo.to_string(),
            },
            path: RawField {
                raw: path.to_string(),
            },
            content: SnippetField {
                snippet: snippet.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetField {
    #[serde(default)]
    pub snippet: String,
}

/// Upstream totals: hit count and page count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub pages: u32,
}

// ============================================================================
// Search Options
// ============================================================================

/// Upstream filters applied to every page of a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub use_regex: bool,
    pub whole_words: bool,
    pub repo_filter: Option<String>,
    pub path_filter: Option<String>,
    /// Comma-separated language list
    pub lang_filter: Option<String>,
}

/// Query-string parameters for one page request; unset filters are omitted
pub(crate) fn query_params(query: &str, page: u32, options: &SearchOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![("q", query.to_string()), ("page", page.to_string())];

    if options.case_sensitive {
        params.push(("case", "1".to_string()));
    }
    if options.use_regex {
        params.push(("regexp", "1".to_string()));
    }
    if options.whole_words {
        params.push(("words", "1".to_string()));
    }

    let filters = [
        ("repo", &options.repo_filter),
        ("path", &options.path_filter),
        ("lang", &options.lang_filter),
    ];
    for (name, value) in filters {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            params.push((name, value.to_string()));
        }
    }

    params
}

// ============================================================================
// Client
// ============================================================================

/// Upstream search collaborator
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetch one page; a non-success status or an undecodable body is an error
    async fn fetch_page(&self, query: &str, page: u32, options: &SearchOptions) -> Result<SearchPage>;
}

/// grep.app search API over `reqwest`
pub struct GrepAppClient {
    http: reqwest::Client,
    api_base: String,
    observer: Arc<dyn Observer>,
}

impl GrepAppClient {
    pub fn new(config: &SearchConfig, observer: Arc<dyn Observer>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ScoutError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            observer,
        })
    }

    async fn send(&self, url: reqwest::Url) -> (Option<u16>, Result<SearchPage>) {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return (
                    None,
                    Err(ScoutError::upstream(format!("failed to execute request: {}", e))),
                )
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return (
                Some(status.as_u16()),
                Err(ScoutError::upstream(format!(
                    "API request failed with status {}: {}",
                    status.as_u16(),
                    body
                ))),
            );
        }

        let page = response
            .json::<SearchPage>()
            .await
            .map_err(|e| ScoutError::upstream(format!("failed to decode API response: {}", e)));
        (Some(status.as_u16()), page)
    }
}

#[async_trait]
impl SearchClient for GrepAppClient {
    async fn fetch_page(&self, query: &str, page: u32, options: &SearchOptions) -> Result<SearchPage> {
        let params = query_params(query, page, options);
        let url = reqwest::Url::parse_with_params(&self.api_base, &params)
            .map_err(|e| ScoutError::config(format!("invalid search API URL: {}", e)))?;

        let started = Instant::now();
        let (status, result) = self.send(url.clone()).await;

        self.observer.record(&Event::ApiRequest(ApiRequestRecord {
            url: url.to_string(),
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            error: result.as_ref().err().map(|e| e.to_string()),
        }));

        result
    }
}
