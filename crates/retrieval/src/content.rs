//! File-content collaborator: GitHub contents API

use crate::repo::RepoRef;
use async_trait::async_trait;
use base64::Engine;
use config::GithubConfig;
use error::{Result, ScoutError};
use observability::{ApiRequestRecord, Event, Observer};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fetches one file's text from a repository
#[async_trait]
pub trait FileContentClient: Send + Sync {
    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Result<String>;
}

/// Subset of the contents API response we rely on
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

pub struct GithubContentClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    observer: Arc<dyn Observer>,
}

impl GithubContentClient {
    pub fn new(config: &GithubConfig, observer: Arc<dyn Observer>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            observer,
        })
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ScoutError::config(format!("invalid GitHub API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ScoutError::config("GitHub API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn get(&self, url: reqwest::Url, accept: &str) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, accept)
            .header(USER_AGENT, concat!("codescout/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                Err((
                    Some(status),
                    ScoutError::upstream(format!("GitHub API returned status {}: {}", status, body)),
                ))
            }
            Err(e) => Err((
                None,
                ScoutError::upstream(format!("failed to execute request: {}", e)),
            )),
        };

        self.observer.record(&Event::ApiRequest(ApiRequestRecord {
            url: url.to_string(),
            status: match &outcome {
                Ok(response) => Some(response.status().as_u16()),
                Err((status, _)) => *status,
            },
            duration_ms: started.elapsed().as_millis() as u64,
            error: outcome.as_ref().err().map(|(_, e)| e.to_string()),
        }));

        outcome.map_err(|(_, e)| e)
    }

    async fn download_raw(&self, download_url: &str) -> Result<String> {
        let url = reqwest::Url::parse(download_url)
            .map_err(|e| ScoutError::upstream(format!("invalid download URL: {}", e)))?;
        let bytes = self
            .get(url, "*/*")
            .await?
            .bytes()
            .await
            .map_err(|e| ScoutError::upstream(format!("failed to read file body: {}", e)))?;
        into_utf8(bytes.to_vec())
    }
}

#[async_trait]
impl FileContentClient for GithubContentClient {
    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let url = self.contents_url(repo, path)?;
        let body: ContentsResponse = self
            .get(url, "application/vnd.github+json")
            .await?
            .json()
            .await
            .map_err(|e| ScoutError::upstream(format!("failed to decode contents response: {}", e)))?;

        if body.kind != "file" {
            return Err(ScoutError::upstream(format!(
                "{}/{} is not a file (type: {})",
                repo, path, body.kind
            )));
        }

        match (body.encoding.as_deref(), body.content, body.download_url) {
            (Some("base64"), Some(content), _) if !content.is_empty() => decode_base64(&content),
            (_, _, Some(download_url)) => self.download_raw(&download_url).await,
            (encoding, _, _) => Err(ScoutError::upstream(format!(
                "unsupported content encoding for {}/{}: {}",
                repo,
                path,
                encoding.unwrap_or("none")
            ))),
        }
    }
}

/// The contents API wraps base64 at 60 columns
pub(crate) fn decode_base64(content: &str) -> Result<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ScoutError::parse(format!("failed to decode file content: {}", e)))?;
    into_utf8(bytes)
}

fn into_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| ScoutError::parse("file content is not valid UTF-8"))
}
