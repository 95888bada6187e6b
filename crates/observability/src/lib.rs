//! Operation observability for codescout
//!
//! Components never reach for a global logger. They receive an `Arc<dyn Observer>`
//! and report operation events through it:
//! - `TracingObserver` forwards everything to `tracing`
//! - `JsonlObserver` additionally appends one JSON object per event to a daily file
//! - `MemoryObserver` keeps events in memory for tests

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

mod jsonl;

pub use jsonl::{JsonlObserver, LogEntry};

// ============================================================================
// Levels and Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Outcome of one `search` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub use_regex: bool,
    pub case_sensitive: bool,
    pub whole_words: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_filter: Option<String>,
    /// Upstream-reported total hit count
    pub result_count: u64,
    pub file_count: usize,
    pub line_count: usize,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when every page came from cache
    pub cache_hit: bool,
    pub pages_scanned: u32,
    pub api_requests: u32,
    pub regex_filtered: bool,
}

/// Outcome of one batch retrieval call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub query: String,
    pub requested_numbers: Vec<usize>,
    pub files_found: usize,
    pub files_success: usize,
    pub files_error: usize,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One upstream HTTP exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequestRecord {
    pub url: String,
    pub status: Option<u16>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Event {
    SearchStart {
        query: String,
    },
    SearchComplete(SearchRecord),
    BatchRetrievalStart {
        query: String,
        requested_numbers: Vec<usize>,
    },
    BatchRetrievalComplete(RetrievalRecord),
    ApiRequest(ApiRequestRecord),
    CacheOperation {
        cache_key: String,
        hit: bool,
        query: String,
    },
}

impl Event {
    pub fn tool(&self) -> &'static str {
        match self {
            Event::SearchStart { .. } | Event::SearchComplete(_) => "search",
            Event::BatchRetrievalStart { .. } | Event::BatchRetrievalComplete(_) => "retrieve",
            Event::ApiRequest(_) => "api",
            Event::CacheOperation { .. } => "cache",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Event::SearchComplete(r) if !r.success => Level::Error,
            Event::SearchComplete(r) if r.file_count == 0 => Level::Warn,
            Event::BatchRetrievalComplete(r) if !r.success => Level::Error,
            Event::ApiRequest(r) if r.error.is_some() => Level::Error,
            Event::CacheOperation { .. } => Level::Debug,
            _ => Level::Info,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Event::SearchStart { query } => format!("Starting search for query: {}", query),
            Event::SearchComplete(r) if !r.success => format!(
                "Search failed: {} - {}",
                r.query,
                r.error.as_deref().unwrap_or("unknown error")
            ),
            Event::SearchComplete(r) if r.file_count == 0 => {
                format!("Search returned zero results: {}", r.query)
            }
            Event::SearchComplete(r) => {
                format!("Search completed: {} (files: {})", r.query, r.file_count)
            }
            Event::BatchRetrievalStart {
                query,
                requested_numbers,
            } => format!(
                "Starting batch retrieval for query: {} ({} numbers requested)",
                query,
                requested_numbers.len()
            ),
            Event::BatchRetrievalComplete(r) if !r.success => format!(
                "Batch retrieval failed: {} - {}",
                r.query,
                r.error.as_deref().unwrap_or("unknown error")
            ),
            Event::BatchRetrievalComplete(r) => format!(
                "Batch retrieval completed: {} ({} success, {} errors)",
                r.query, r.files_success, r.files_error
            ),
            Event::ApiRequest(r) => match &r.error {
                Some(err) => format!("API request failed: {} - {}", r.url, err),
                None => format!(
                    "API request to {} ({}) in {}ms",
                    r.url,
                    r.status.unwrap_or_default(),
                    r.duration_ms
                ),
            },
            Event::CacheOperation { hit, query, .. } => format!(
                "Cache {} for query: {}",
                if *hit { "HIT" } else { "MISS" },
                query
            ),
        }
    }

    /// Structured payload, tagged with `operation`
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Observer Trait
// ============================================================================

/// Observability collaborator injected into the aggregator and the orchestrator
pub trait Observer: Send + Sync {
    /// Free-form log line
    fn log(&self, level: Level, tool: &str, message: &str, data: serde_json::Value);

    /// Structured operation event
    fn record(&self, event: &Event) {
        self.log(event.level(), event.tool(), &event.message(), event.data());
    }
}

/// Forwards to `tracing`; the default observer
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn log(&self, level: Level, tool: &str, message: &str, data: serde_json::Value) {
        match level {
            Level::Debug => tracing::debug!(tool, %data, "{}", message),
            Level::Info => tracing::info!(tool, %data, "{}", message),
            Level::Warn => tracing::warn!(tool, %data, "{}", message),
            Level::Error => tracing::error!(tool, %data, "{}", message),
        }
    }
}

// ============================================================================
// Memory Observer
// ============================================================================

/// A log line captured by [`MemoryObserver`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedLine {
    pub level: Level,
    pub tool: String,
    pub message: String,
}

/// Captures events and log lines in memory
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<Event>>,
    lines: Mutex<Vec<LoggedLine>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<LoggedLine> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl Observer for MemoryObserver {
    fn log(&self, level: Level, tool: &str, message: &str, _data: serde_json::Value) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(LoggedLine {
                level,
                tool: tool.to_string(),
                message: message.to_string(),
            });
        }
    }

    fn record(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        self.log(event.level(), event.tool(), &event.message(), event.data());
    }
}
