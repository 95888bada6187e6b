//! Repository address parsing

use error::{Result, ScoutError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Accepts `owner/name`, `owner/name.git` and `https://github.com/owner/name`, anchored
static REPO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://github\.com/)?([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?$")
        .expect("repository pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

pub fn parse_repo(repo: &str) -> Result<RepoRef> {
    let caps = REPO_PATTERN
        .captures(repo.trim())
        .ok_or_else(|| ScoutError::validation(format!("invalid repository format: {}", repo)))?;

    Ok(RepoRef {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}
