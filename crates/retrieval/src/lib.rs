//! Batch file retrieval for codescout
//!
//! Resolves caller-visible result numbers against the complete aggregate a previous
//! search cached, then fetches the referenced files concurrently. One file's failure
//! never fails the batch; results always come back ordered by result number.

mod content;
mod orchestrator;
mod repo;

pub use content::{FileContentClient, GithubContentClient};
pub use orchestrator::{BatchRetrievalResult, RetrievedFile, Retriever};
pub use repo::{parse_repo, RepoRef};
