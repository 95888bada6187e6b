//! Canonical result shape: repository → path → line number → line text

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line number (as a decimal string) → matched line text
pub type LineMap = BTreeMap<String, String>;

/// File path → matched lines
pub type FileMap = BTreeMap<String, LineMap>;

/// Aggregated search matches.
///
/// Serializes as the bare nested map. Presentation order is imposed by callers:
/// repositories and paths lexicographically, line numbers numerically
/// (see [`sorted_lines`]); the string keys alone would put "10" before "9".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    repos: BTreeMap<String, FileMap>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one matched line; an existing line with the same key is replaced
    pub fn insert_line(
        &mut self,
        repo: impl Into<String>,
        path: impl Into<String>,
        line: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.repos
            .entry(repo.into())
            .or_default()
            .entry(path.into())
            .or_default()
            .insert(line.into(), text.into());
    }

    /// Record every line of one file; an empty `lines` leaves the set untouched
    pub fn insert_lines(&mut self, repo: &str, path: &str, lines: LineMap) {
        if lines.is_empty() {
            return;
        }
        self.repos
            .entry(repo.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default()
            .extend(lines);
    }

    /// Union of leaves; on an identical (repo, path, line) key `other` wins
    pub fn merge(&mut self, other: ResultSet) {
        for (repo, files) in other.repos {
            let target = self.repos.entry(repo).or_default();
            for (path, lines) in files {
                target.entry(path).or_default().extend(lines);
            }
        }
    }

    pub fn repos(&self) -> impl Iterator<Item = (&String, &FileMap)> {
        self.repos.iter()
    }

    pub fn files(&self, repo: &str) -> Option<&FileMap> {
        self.repos.get(repo)
    }

    pub fn lines(&self, repo: &str, path: &str) -> Option<&LineMap> {
        self.repos.get(repo).and_then(|files| files.get(path))
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn repo_count(&self) -> usize {
        self.repos.len()
    }

    pub fn file_count(&self) -> usize {
        self.repos.values().map(|files| files.len()).sum()
    }

    pub fn line_count(&self) -> usize {
        self.repos
            .values()
            .flat_map(|files| files.values())
            .map(|lines| lines.len())
            .sum()
    }
}

impl FromIterator<(String, FileMap)> for ResultSet {
    fn from_iter<I: IntoIterator<Item = (String, FileMap)>>(iter: I) -> Self {
        Self {
            repos: iter.into_iter().collect(),
        }
    }
}

/// Lines in ascending numeric order; keys that are not numbers sort last
pub fn sorted_lines(lines: &LineMap) -> Vec<(&str, &str)> {
    let mut sorted: Vec<(&str, &str)> = lines
        .iter()
        .map(|(number, text)| (number.as_str(), text.as_str()))
        .collect();
    sorted.sort_by_key(|(number, _)| {
        let parsed = number.parse::<u64>().ok();
        (parsed.is_none(), parsed, *number)
    });
    sorted
}

/// The complete aggregate cached for later retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteAggregate {
    pub hits: ResultSet,
    /// Upstream-reported total hit count
    pub count: u64,
}
