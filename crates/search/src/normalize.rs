//! Page normalization: raw upstream hits → page-local ResultSet

use crate::client::RawHit;
use crate::model::ResultSet;
use crate::snippet::SnippetExtractor;
use observability::{Level, Observer};
use serde_json::json;

/// Build the ResultSet for one page.
///
/// A hit whose snippet cannot be parsed is dropped with a warning; the rest of the
/// page is kept. Hits without matched lines contribute nothing.
pub fn normalize_page(
    hits: &[RawHit],
    extractor: &dyn SnippetExtractor,
    observer: &dyn Observer,
) -> ResultSet {
    let mut page = ResultSet::new();

    for hit in hits {
        match extractor.extract(&hit.content.snippet) {
            // A hit with no matched lines gets no entry, so it never takes a result number
            Ok(lines) => page.insert_lines(&hit.repo.raw, &hit.path.raw, lines),
            Err(e) => observer.log(
                Level::Warn,
                "search",
                &format!("Failed to parse snippet for repo {}: {}", hit.repo.raw, e),
                json!({ "repo": hit.repo.raw, "path": hit.path.raw }),
            ),
        }
    }

    page
}
