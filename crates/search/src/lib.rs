//! Public code search for codescout
//!
//! A search request drives the [`Aggregator`] across upstream pages, normalizes each
//! page's HTML snippets into a [`ResultSet`], merges them, optionally applies a regex
//! line filter, and caches the complete aggregate under a query-only fingerprint.
//! The numbering produced by [`flatten`] over that cached aggregate is the handle a
//! later retrieval call uses to address individual files.

mod aggregate;
mod client;
mod filter;
mod format;
mod keys;
mod model;
mod normalize;
mod numbering;
mod snippet;
mod tool;

pub use aggregate::{load_complete, Aggregation, Aggregator, DEFAULT_MAX_PAGES};
pub use client::{
    Facets, GrepAppClient, HitList, RawField, RawHit, SearchClient, SearchOptions, SearchPage,
    SnippetField,
};
pub use filter::{compile_line_filter, filter_lines};
pub use format::{format_json, format_numbered, format_text, render, OutputMode, NO_RESULTS};
pub use keys::{complete_fingerprint, page_fingerprint};
pub use model::{sorted_lines, CompleteAggregate, FileMap, LineMap, ResultSet};
pub use normalize::normalize_page;
pub use numbering::{flatten, NumberedHit};
pub use snippet::{HtmlSnippetExtractor, SnippetExtractor};
pub use tool::{SearchParams, SearchTool};
