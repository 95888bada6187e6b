//! Stable 1-based numbering over (repository, path) pairs

use crate::model::ResultSet;
use serde::{Deserialize, Serialize};

/// A caller-addressable reference into a ResultSet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedHit {
    pub number: usize,
    pub repo: String,
    pub path: String,
}

/// Number every (repository, path) pair: repositories sorted, then paths within each
/// repository sorted, numbers assigned 1..N in that walk order.
///
/// Both the numbered output and retrieval resolve numbers through this function;
/// they must never diverge.
pub fn flatten(hits: &ResultSet) -> Vec<NumberedHit> {
    let mut repos: Vec<_> = hits.repos().collect();
    repos.sort_by(|a, b| a.0.cmp(b.0));

    let mut numbered = Vec::with_capacity(hits.file_count());
    for (repo, files) in repos {
        let mut paths: Vec<&String> = files.keys().collect();
        paths.sort();

        for path in paths {
            numbered.push(NumberedHit {
                number: numbered.len() + 1,
                repo: repo.clone(),
                path: path.clone(),
            });
        }
    }

    numbered
}
