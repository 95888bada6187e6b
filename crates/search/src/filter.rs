//! Regex post-filter over already aggregated matches

use crate::model::{FileMap, LineMap, ResultSet};
use error::{Result, ScoutError};
use regex::Regex;

/// Compile a line filter. Runs before any upstream request so an unusable pattern
/// never costs an API round-trip.
pub fn compile_line_filter(pattern: &str) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(ScoutError::validation("regex filter pattern must not be empty"));
    }
    Regex::new(pattern)
        .map_err(|e| ScoutError::validation(format!("invalid regex filter {:?}: {}", pattern, e)))
}

/// Keep only lines whose text matches; files and repositories left empty are pruned
pub fn filter_lines(hits: &ResultSet, pattern: &Regex) -> ResultSet {
    hits.repos()
        .filter_map(|(repo, files)| {
            let kept: FileMap = files
                .iter()
                .filter_map(|(path, lines)| {
                    let kept: LineMap = lines
                        .iter()
                        .filter(|(_, text)| pattern.is_match(text))
                        .map(|(n, text)| (n.clone(), text.clone()))
                        .collect();
                    (!kept.is_empty()).then(|| (path.clone(), kept))
                })
                .collect();
            (!kept.is_empty()).then(|| (repo.clone(), kept))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut hits = ResultSet::new();
        hits.insert_line("repoA", "main.go", "2", "func main() {");
        hits.insert_line("repoA", "main.go", "9", "// main entry");
        hits.insert_line("repoA", "util.go", "4", "// main helper");
        hits.insert_line("repoB", "cmd.go", "1", "// nothing to see");
        hits
    }

    #[test]
    fn test_match_nothing_yields_empty() {
        let filtered = filter_lines(&sample(), &compile_line_filter("^zzz$").unwrap());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_match_everything_is_identity() {
        let hits = sample();
        assert_eq!(filter_lines(&hits, &compile_line_filter(".*").unwrap()), hits);
    }

    #[test]
    fn test_prunes_empty_files_and_repos() {
        let filtered = filter_lines(&sample(), &compile_line_filter(r"^func\s").unwrap());

        assert_eq!(filtered.repo_count(), 1);
        assert_eq!(filtered.file_count(), 1);
        assert_eq!(filtered.line_count(), 1);
        assert!(filtered.lines("repoA", "util.go").is_none());
        assert!(filtered.files("repoB").is_none());
    }

    #[test]
    fn test_invalid_patterns_are_validation_errors() {
        assert!(compile_line_filter("").unwrap_err().is_validation());
        assert!(compile_line_filter("(unclosed").unwrap_err().is_validation());
    }
}
