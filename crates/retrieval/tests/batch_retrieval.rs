//! End-to-end retrieval against a cached aggregate with a scripted file client

use async_trait::async_trait;
use cache::Cache;
use error::{Result, ScoutError};
use observability::{Event, MemoryObserver};
use retrieval::{FileContentClient, RepoRef, Retriever};
use search::{
    complete_fingerprint, Aggregator, CompleteAggregate, Facets, HitList, HtmlSnippetExtractor,
    RawHit, ResultSet, SearchClient, SearchOptions, SearchPage,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const QUERY: &str = "func main";

/// Per-path behaviour: delay, then content or failure
#[derive(Default)]
struct ScriptedFiles {
    files: HashMap<String, (u64, Option<String>)>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFiles {
    fn file(mut self, repo: &str, path: &str, delay_ms: u64, content: Option<&str>) -> Self {
        self.files.insert(
            format!("{}/{}", repo, path),
            (delay_ms, content.map(str::to_string)),
        );
        self
    }

    fn requested(&self) -> Vec<String> {
        let mut requested = self.requested.lock().unwrap().clone();
        requested.sort();
        requested
    }
}

#[async_trait]
impl FileContentClient for ScriptedFiles {
    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let key = format!("{}/{}", repo, path);
        self.requested.lock().unwrap().push(key.clone());

        let (delay_ms, content) = self
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| ScoutError::not_found(key.clone()))?;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        content.ok_or_else(|| ScoutError::upstream("failed to execute request: connection reset"))
    }
}

fn scenario_hits() -> ResultSet {
    let mut hits = ResultSet::new();
    hits.insert_line("acme/repoA", "file1.go", "2", "func main() {");
    hits.insert_line("acme/repoA", "file2.go", "5", "func main() {");
    hits.insert_line("acme/repoB", "file1.go", "1", "func main() {");
    hits
}

fn seeded_cache() -> Arc<Cache> {
    let cache = Cache::in_memory();
    let complete = CompleteAggregate {
        hits: scenario_hits(),
        count: 4,
    };
    cache.put(&complete_fingerprint(QUERY), &complete, QUERY).unwrap();
    Arc::new(cache)
}

fn retriever(cache: Arc<Cache>, files: Arc<ScriptedFiles>) -> (Retriever, Arc<MemoryObserver>) {
    let observer = Arc::new(MemoryObserver::new());
    (Retriever::new(cache, files, observer.clone()), observer)
}

fn numbers(result: &retrieval::BatchRetrievalResult) -> Vec<usize> {
    result.files.iter().map(|f| f.number).collect()
}

#[tokio::test]
async fn test_selected_numbers_come_back_in_order() {
    // repoA/file1.go finishes last
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 80, Some("package a"))
            .file("acme/repoB", "file1.go", 5, Some("package b")),
    );
    let (retriever, _) = retriever(seeded_cache(), files.clone());

    let result = retriever
        .retrieve(QUERY, Some(&[3, 1]), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(numbers(&result), vec![1, 3]);
    assert_eq!(result.files[0].repo, "acme/repoA");
    assert_eq!(result.files[0].content, "package a");
    assert_eq!(result.files[1].path, "file1.go");
    assert_eq!(result.files[1].content, "package b");
    assert_eq!(
        files.requested(),
        vec!["acme/repoA/file1.go", "acme/repoB/file1.go"]
    );
}

#[tokio::test]
async fn test_one_failed_fetch_does_not_fail_the_batch() {
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 5, Some("package a"))
            .file("acme/repoB", "file1.go", 5, None),
    );
    let (retriever, observer) = retriever(seeded_cache(), files);

    let result = retriever
        .retrieve(QUERY, Some(&[1, 3]), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.files[0].error, None);
    assert_eq!(result.files[0].content, "package a");
    assert!(!result.files[1].error.as_deref().unwrap_or_default().is_empty());
    assert!(result.files[1].content.is_empty());

    let record = observer.events().into_iter().find_map(|e| match e {
        Event::BatchRetrievalComplete(r) => Some(r),
        _ => None,
    });
    let record = record.unwrap();
    assert_eq!((record.files_success, record.files_error), (1, 1));
}

#[tokio::test]
async fn test_no_numbers_retrieves_everything() {
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 30, Some("a1"))
            .file("acme/repoA", "file2.go", 20, Some("a2"))
            .file("acme/repoB", "file1.go", 10, Some("b1")),
    );
    let (retriever, _) = retriever(seeded_cache(), files);

    let result = retriever.retrieve(QUERY, None, &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(numbers(&result), vec![1, 2, 3]);
    let contents: Vec<&str> = result.files.iter().map(|f| f.content.as_str()).collect();
    assert_eq!(contents, vec!["a1", "a2", "b1"]);
}

#[tokio::test]
async fn test_empty_number_list_retrieves_everything() {
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 1, Some("a1"))
            .file("acme/repoA", "file2.go", 1, Some("a2"))
            .file("acme/repoB", "file1.go", 1, Some("b1")),
    );
    let (retriever, _) = retriever(seeded_cache(), files);

    let result = retriever.retrieve(QUERY, Some(&[]), &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(numbers(&result), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_bounded_concurrency_still_fetches_everything() {
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 10, Some("a1"))
            .file("acme/repoA", "file2.go", 10, Some("a2"))
            .file("acme/repoB", "file1.go", 10, Some("b1")),
    );
    let (retriever, _) = retriever(seeded_cache(), files);
    let retriever = retriever.with_concurrency(Some(1));

    let result = retriever.retrieve(QUERY, None, &CancellationToken::new()).await;

    assert_eq!(result.success_count(), 3);
    assert_eq!(numbers(&result), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_missing_aggregate_is_a_failure_result() {
    let files = Arc::new(ScriptedFiles::default());
    let (retriever, _) = retriever(Arc::new(Cache::in_memory()), files.clone());

    let result = retriever.retrieve(QUERY, Some(&[1]), &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.files.is_empty());
    assert_eq!(
        result.error.as_deref(),
        Some("No cached results found for query: func main")
    );
    assert!(files.requested().is_empty());
}

#[tokio::test]
async fn test_unmatched_numbers_are_a_failure_result() {
    let files = Arc::new(ScriptedFiles::default());
    let (retriever, _) = retriever(seeded_cache(), files.clone());

    let result = retriever.retrieve(QUERY, Some(&[7, 9]), &CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("No results found for the given result numbers.")
    );
    assert!(files.requested().is_empty());
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let (retriever, _) = retriever(seeded_cache(), Arc::new(ScriptedFiles::default()));

    let result = retriever.retrieve("", None, &CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("query parameter is required"));
}

#[tokio::test]
async fn test_unparseable_repository_is_skipped() {
    let mut hits = scenario_hits();
    hits.insert_line("not-a-repo", "main.go", "1", "func main() {");
    let cache = Cache::in_memory();
    cache
        .put(&complete_fingerprint(QUERY), &CompleteAggregate { hits, count: 5 }, QUERY)
        .unwrap();

    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 1, Some("a1"))
            .file("acme/repoA", "file2.go", 1, Some("a2"))
            .file("acme/repoB", "file1.go", 1, Some("b1")),
    );
    let (retriever, observer) = retriever(Arc::new(cache), files);

    let result = retriever.retrieve(QUERY, None, &CancellationToken::new()).await;

    // "not-a-repo" sorts last and keeps its number even though it is skipped
    assert!(result.success);
    assert_eq!(numbers(&result), vec![1, 2, 3]);
    assert!(observer
        .lines()
        .iter()
        .any(|l| l.message.contains("Skipping result 4")));
}

#[tokio::test]
async fn test_cancellation_returns_partial_results() {
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file1.go", 1, Some("a1"))
            .file("acme/repoB", "file1.go", 10_000, Some("b1")),
    );
    let (retriever, _) = retriever(seeded_cache(), files);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        retriever.retrieve(QUERY, Some(&[1, 3]), &cancel),
    )
    .await
    .expect("retrieval must not hang after cancellation");

    assert!(result.success);
    assert_eq!(result.files[0].content, "a1");
    assert_eq!(result.files[1].error.as_deref(), Some("request cancelled"));
}

/// Serves the two-page scenario as grep.app HTML snippets
struct TwoPageSearch;

fn snippet(line: u32, text: &str) -> String {
    format!(
        "<table><tr><td><div class=\"lineno\">{}</div></td><td><pre>{}</pre></td></tr></table>",
        line,
        text.replacen("main", "<mark>main</mark>", 1)
    )
}

#[async_trait]
impl SearchClient for TwoPageSearch {
    async fn fetch_page(&self, _query: &str, page: u32, _options: &SearchOptions) -> Result<SearchPage> {
        let hits = match page {
            1 => vec![
                RawHit::new("acme/repoA", "file1.go", &snippet(2, "func main() {")),
                RawHit::new("acme/repoA", "file2.go", &snippet(5, "func main() {")),
                RawHit::new("acme/repoA", "file1.go", &snippet(2, "func main() {")),
            ],
            _ => vec![RawHit::new("acme/repoB", "file1.go", &snippet(1, "func main() {"))],
        };
        Ok(SearchPage {
            hits: HitList { hits },
            facets: Facets { count: 4, pages: 2 },
        })
    }
}

#[tokio::test]
async fn test_search_then_retrieve_across_cache_instances() {
    let dir = tempfile::tempdir().unwrap();

    // Search with one cache handle
    let search_cache = Arc::new(Cache::on_disk(dir.path(), cache::DEFAULT_TTL));
    let aggregator = Aggregator::new(
        Arc::new(TwoPageSearch),
        search_cache,
        Arc::new(HtmlSnippetExtractor::new().unwrap()),
        Arc::new(MemoryObserver::new()),
    );
    aggregator
        .aggregate(QUERY, &SearchOptions::default(), None, &CancellationToken::new())
        .await
        .unwrap();

    // Retrieve with a fresh one over the same directory
    let files = Arc::new(
        ScriptedFiles::default()
            .file("acme/repoA", "file2.go", 1, Some("a2"))
            .file("acme/repoB", "file1.go", 1, Some("b1")),
    );
    let (retriever, _) = retriever(
        Arc::new(Cache::on_disk(dir.path(), cache::DEFAULT_TTL)),
        files,
    );

    let result = retriever.retrieve(QUERY, Some(&[2, 3]), &CancellationToken::new()).await;

    assert!(result.success);
    let view: Vec<(usize, &str, &str)> = result
        .files
        .iter()
        .map(|f| (f.number, f.repo.as_str(), f.path.as_str()))
        .collect();
    assert_eq!(
        view,
        vec![(2, "acme/repoA", "file2.go"), (3, "acme/repoB", "file1.go")]
    );
}
