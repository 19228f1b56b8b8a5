use crate::error::RemoteError;
use async_trait::async_trait;

/// Upstream page size for repository and commit listings.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub date: String,
}

/// A source-code host exposing one page per call. Pages are 1-based and the
/// host declares no total; an empty page marks the end.
#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn list_repos_page(&self, page: u32, per_page: u32)
    -> Result<Vec<RepoSummary>, RemoteError>;
    async fn list_commits_page(
        &self,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>, RemoteError>;
    async fn get_diff(&self, repo: &str, sha: &str) -> Result<String, RemoteError>;
}
