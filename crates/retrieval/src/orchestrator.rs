//! Batch retrieval: cached numbering → concurrent file fetches → renumbered result

use crate::content::FileContentClient;
use crate::repo::{parse_repo, RepoRef};
use cache::Cache;
use error::{Result, ScoutError};
use futures::future::join_all;
use observability::{Event, Level, Observer, RetrievalRecord};
use search::{flatten, load_complete, NumberedHit};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Outcome of fetching one file, tagged with its caller-visible number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedFile {
    pub number: usize,
    pub repo: String,
    pub path: String,
    /// Empty when `error` is set
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRetrievalResult {
    pub success: bool,
    pub files: Vec<RetrievedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchRetrievalResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            files: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn success_count(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_none()).count()
    }

    pub fn error_count(&self) -> usize {
        self.files.len() - self.success_count()
    }
}

/// Resolves result numbers against a query's cached aggregate and fetches the files
pub struct Retriever {
    cache: Arc<Cache>,
    client: Arc<dyn FileContentClient>,
    observer: Arc<dyn Observer>,
    concurrency: Option<usize>,
}

impl Retriever {
    pub fn new(cache: Arc<Cache>, client: Arc<dyn FileContentClient>, observer: Arc<dyn Observer>) -> Self {
        Self {
            cache,
            client,
            observer,
            concurrency: None,
        }
    }

    /// Bound simultaneous fetches; `None` or 0 leaves the fan-out unbounded
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit.filter(|n| *n > 0);
        self
    }

    /// Retrieve the files behind `numbers` (all files when `None` or empty) for a query that was
    /// searched earlier.
    ///
    /// Never fails as a call: a missing aggregate or an unmatched selection comes back
    /// as `success = false`, and per-file failures are carried on the individual files.
    pub async fn retrieve(
        &self,
        query: &str,
        numbers: Option<&[usize]>,
        cancel: &CancellationToken,
    ) -> BatchRetrievalResult {
        let start = Instant::now();
        let requested_numbers = numbers.map(<[usize]>::to_vec).unwrap_or_default();
        self.observer.record(&Event::BatchRetrievalStart {
            query: query.to_string(),
            requested_numbers: requested_numbers.clone(),
        });

        let result = self.run(query, numbers, cancel).await;

        self.observer.record(&Event::BatchRetrievalComplete(RetrievalRecord {
            query: query.to_string(),
            requested_numbers,
            files_found: result.files.len(),
            files_success: result.success_count(),
            files_error: result.error_count(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: result.success,
            error: result.error.clone(),
        }));

        result
    }

    async fn run(&self, query: &str, numbers: Option<&[usize]>, cancel: &CancellationToken) -> BatchRetrievalResult {
        if query.trim().is_empty() {
            return BatchRetrievalResult::failure("query parameter is required");
        }

        let Some(complete) = load_complete(&self.cache, query) else {
            return BatchRetrievalResult::failure(format!("No cached results found for query: {}", query));
        };

        // An empty selection means no selection
        let numbers = numbers.filter(|n| !n.is_empty());
        let selected = select(flatten(&complete.hits), numbers);
        if selected.is_empty() {
            return BatchRetrievalResult::failure("No results found for the given result numbers.");
        }

        let batch = self.resolve(selected);
        let files = self.fetch_all(&batch, cancel).await;

        BatchRetrievalResult {
            success: true,
            files,
            error: None,
        }
    }

    /// Parse repository addresses; unparseable ones are dropped from the batch
    fn resolve(&self, selected: Vec<NumberedHit>) -> Vec<(NumberedHit, RepoRef)> {
        selected
            .into_iter()
            .filter_map(|hit| match parse_repo(&hit.repo) {
                Ok(repo) => Some((hit, repo)),
                Err(e) => {
                    self.observer.log(
                        Level::Warn,
                        "retrieve",
                        &format!("Skipping result {}: {}", hit.number, e),
                        json!({ "number": hit.number, "repo": hit.repo, "path": hit.path }),
                    );
                    None
                }
            })
            .collect()
    }

    async fn fetch_all(&self, batch: &[(NumberedHit, RepoRef)], cancel: &CancellationToken) -> Vec<RetrievedFile> {
        let semaphore = self.concurrency.map(Semaphore::new);

        // In flight, a request is known only by its slot in `batch`
        let requests = batch.iter().enumerate().map(|(slot, (hit, repo))| {
            let semaphore = semaphore.as_ref();
            async move { (slot, self.fetch_one(repo, &hit.path, semaphore, cancel).await) }
        });
        let outcomes = join_all(requests).await;

        let mut files: Vec<RetrievedFile> = outcomes
            .into_iter()
            .map(|(slot, outcome)| {
                let hit = &batch[slot].0;
                let (content, error) = match outcome {
                    Ok(content) => (content, None),
                    Err(e) => (String::new(), Some(e.to_string())),
                };
                RetrievedFile {
                    number: hit.number,
                    repo: hit.repo.clone(),
                    path: hit.path.clone(),
                    content,
                    error,
                }
            })
            .collect();

        files.sort_by_key(|f| f.number);
        files
    }

    async fn fetch_one(
        &self,
        repo: &RepoRef,
        path: &str,
        semaphore: Option<&Semaphore>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let fetch = async {
            let _permit = match semaphore {
                Some(semaphore) => Some(semaphore.acquire().await.map_err(|_| ScoutError::Cancelled)?),
                None => None,
            };
            self.client.fetch_file(repo, path).await
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(ScoutError::Cancelled),
            result = fetch => result,
        }
    }
}

/// Intersect the numbered list with the requested numbers; unknown numbers are ignored
fn select(hits: Vec<NumberedHit>, numbers: Option<&[usize]>) -> Vec<NumberedHit> {
    match numbers {
        None => hits,
        Some(numbers) => {
            let wanted: HashSet<usize> = numbers.iter().copied().collect();
            hits.into_iter().filter(|h| wanted.contains(&h.number)).collect()
        }
    }
}
