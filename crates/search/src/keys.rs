//! Cache fingerprints for search pages and complete aggregates

use crate::client::SearchOptions;
use cache::Fingerprint;

/// Key for one raw upstream page: query, page and every filter
pub fn page_fingerprint(query: &str, page: u32, options: &SearchOptions) -> Fingerprint {
    Fingerprint::builder()
        .field("query", query)
        .field("page", page)
        .field("case_sensitive", options.case_sensitive)
        .field("use_regex", options.use_regex)
        .field("whole_words", options.whole_words)
        .field("repo_filter", options.repo_filter.clone().unwrap_or_default())
        .field("path_filter", options.path_filter.clone().unwrap_or_default())
        .field("lang_filter", options.lang_filter.clone().unwrap_or_default())
        .build()
}

/// Key for the complete aggregate of a query; page and filters are deliberately absent
pub fn complete_fingerprint(query: &str) -> Fingerprint {
    Fingerprint::builder()
        .field("query", query)
        .field("complete", true)
        .build()
}
