//! Caller-facing renderings of a ResultSet

use crate::model::{sorted_lines, ResultSet};
use crate::numbering::flatten;
use error::Result;
use std::fmt::Write;

/// Returned instead of any rendering when a search finds nothing
pub const NO_RESULTS: &str = "No results found for your query.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Grouped report with summary counts
    #[default]
    Text,
    /// One numbered entry per (repository, path)
    Numbered,
    /// Pretty-printed nested map
    Json,
}

pub fn render(hits: &ResultSet, mode: OutputMode) -> Result<String> {
    match mode {
        OutputMode::Text => Ok(format_text(hits)),
        OutputMode::Numbered => Ok(format_numbered(hits)),
        OutputMode::Json => format_json(hits),
    }
}

pub fn format_json(hits: &ResultSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(hits)?)
}

pub fn format_text(hits: &ResultSet) -> String {
    let separator = format!("{}\n", "─".repeat(80));
    let mut out = String::new();
    let (mut repo_count, mut file_count, mut line_count) = (0, 0, 0);

    for (repo, files) in hits.repos() {
        repo_count += 1;
        out.push_str(&separator);
        let _ = writeln!(out, "Repository: {}", repo);

        for (path, lines) in files {
            file_count += 1;
            let _ = writeln!(out, "  /{}", path);

            for (number, text) in sorted_lines(lines) {
                line_count += 1;
                let _ = writeln!(out, "    {:>5}: {}", number, text);
            }
        }
    }

    out.push_str(&separator);
    let _ = writeln!(
        out,
        "Summary: Found {} matched lines in {} files across {} repositories.",
        line_count, file_count, repo_count
    );
    out
}

pub fn format_numbered(hits: &ResultSet) -> String {
    let mut out = String::new();

    for hit in flatten(hits) {
        let Some(lines) = hits.lines(&hit.repo, &hit.path) else {
            continue;
        };
        let mut lines = sorted_lines(lines).into_iter();
        let Some((first_number, first_text)) = lines.next() else {
            continue;
        };

        let _ = writeln!(
            out,
            "{}. [{}/{}:{}] {}",
            hit.number, hit.repo, hit.path, first_number, first_text
        );
        for (number, text) in lines {
            let _ = writeln!(out, "   L{}: {}", number, text);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut hits = ResultSet::new();
        hits.insert_line("repoB", "file1.go", "1", "func main() {");
        hits.insert_line("repoA", "file1.go", "2", "func main() {");
        hits.insert_line("repoA", "file1.go", "10", "main()");
        hits.insert_line("repoA", "file2.go", "5", "func main() {");
        hits
    }

    #[test]
    fn test_numbered_output() {
        let expected = "\
1. [repoA/file1.go:2] func main() {
   L10: main()
2. [repoA/file2.go:5] func main() {
3. [repoB/file1.go:1] func main() {
";
        assert_eq!(format_numbered(&sample()), expected);
    }

    #[test]
    fn test_text_output() {
        let text = format_text(&sample());
        let sep = "─".repeat(80);

        let expected = format!(
            "{sep}\nRepository: repoA\n  /file1.go\n        2: func main() {{\n       10: main()\n  /file2.go\n        5: func main() {{\n{sep}\nRepository: repoB\n  /file1.go\n        1: func main() {{\n{sep}\nSummary: Found 4 matched lines in 3 files across 2 repositories.\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_json_output() {
        let json = render(&sample(), OutputMode::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["repoA"]["file1.go"]["10"], "main()");
        assert!(json.contains("\n  \"repoA\": {"));
    }
}
