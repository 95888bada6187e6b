//! Snippet extraction: upstream HTML snippet → matched line table

use crate::model::LineMap;
use error::{Result, ScoutError};
use scraper::{Html, Selector};

/// Turns one opaque upstream snippet into the lines that matched the query
pub trait SnippetExtractor: Send + Sync {
    fn extract(&self, snippet: &str) -> Result<LineMap>;
}

/// Extractor for the highlighted table grep.app returns.
///
/// Each `tr` carries the line number in `div.lineno` and the code in `pre`; a line
/// matched the query when its `pre` contains a `mark`. Context rows are skipped.
#[derive(Debug, Clone)]
pub struct HtmlSnippetExtractor {
    row: Selector,
    line_number: Selector,
    code: Selector,
    mark: Selector,
}

impl HtmlSnippetExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            row: selector("tr")?,
            line_number: selector("div.lineno")?,
            code: selector("pre")?,
            mark: selector("mark")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScoutError::parse(format!("bad selector {}: {}", css, e)))
}

impl SnippetExtractor for HtmlSnippetExtractor {
    fn extract(&self, snippet: &str) -> Result<LineMap> {
        let document = Html::parse_document(snippet);
        let mut lines = LineMap::new();

        for row in document.select(&self.row) {
            let Some(number) = row.select(&self.line_number).next() else {
                continue;
            };
            let number = number.text().collect::<String>();
            let number = number.trim();
            if number.is_empty() {
                continue;
            }

            let Some(code) = row.select(&self.code).next() else {
                continue;
            };
            if code.select(&self.mark).next().is_none() {
                continue;
            }

            if number.parse::<u64>().is_err() {
                return Err(ScoutError::parse(format!(
                    "snippet line number is not numeric: {:?}",
                    number
                )));
            }

            let text = code.text().collect::<String>();
            lines.insert(number.to_string(), text.trim().to_string());
        }

        Ok(lines)
    }
}
