use crate::error::{RemoteError, ScanError};
use crate::source::{CommitSummary, PAGE_SIZE, SourceHost};
use crate::types::{DiffText, ScanResult};
use tracing::{debug, info, warn};

const SHORT_SHA_LEN: usize = 7;

/// Finds every commit whose message mentions a card id across the
/// repositories of an organization.
pub struct RepositoryScanner<'a, H: SourceHost + ?Sized> {
    host: &'a H,
    per_page: u32,
}

impl<'a, H: SourceHost + ?Sized> RepositoryScanner<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            per_page: PAGE_SIZE,
        }
    }

    /// Repository listing failure aborts the scan. Commit listing failures
    /// skip that repository; diff failures are kept as `DiffText::Failed`.
    pub async fn scan(&self, card_id: &str, prefix: &str) -> Result<Vec<ScanResult>, ScanError> {
        info!(card_id, prefix, "scanning repositories");
        let repos = self
            .list_repos(prefix)
            .await
            .map_err(|source| ScanError::ListRepos {
                prefix: prefix.to_string(),
                source,
            })?;
        info!(count = repos.len(), prefix, "repositories to scan");

        let mut results = Vec::new();
        for repo in repos {
            let commits = match self.matching_commits(&repo, card_id).await {
                Ok(commits) => commits,
                Err(err) => {
                    warn!(repo = %repo, error = %err, "skipping repository: commit listing failed");
                    continue;
                }
            };
            if commits.is_empty() {
                debug!(repo = %repo, card_id, "no matching commits");
                continue;
            }
            info!(repo = %repo, card_id, count = commits.len(), "matching commits found");
            for commit in commits {
                let diff = self.fetch_diff(&repo, &commit.sha).await;
                results.push(ScanResult {
                    repo: repo.clone(),
                    sha: short_sha(&commit.sha),
                    message: commit.message,
                    date: commit.date,
                    diff,
                });
            }
        }

        info!(card_id, count = results.len(), "scan completed");
        Ok(results)
    }

    async fn list_repos(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.host.list_repos_page(page, self.per_page).await?;
            if batch.is_empty() {
                debug!(page, "no more repositories");
                break;
            }
            repos.extend(
                batch
                    .into_iter()
                    .map(|repo| repo.name)
                    .filter(|name| name.starts_with(prefix)),
            );
            page += 1;
        }
        Ok(repos)
    }

    async fn matching_commits(
        &self,
        repo: &str,
        card_id: &str,
    ) -> Result<Vec<CommitSummary>, RemoteError> {
        let mut matches = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.host.list_commits_page(repo, page, self.per_page).await?;
            if batch.is_empty() {
                break;
            }
            matches.extend(
                batch
                    .into_iter()
                    .filter(|commit| commit.message.contains(card_id)),
            );
            page += 1;
        }
        Ok(matches)
    }

    async fn fetch_diff(&self, repo: &str, sha: &str) -> DiffText {
        match self.host.get_diff(repo, sha).await {
            Ok(text) => {
                debug!(repo, sha = %short_sha(sha), size = text.len(), "fetched diff");
                DiffText::Fetched(text)
            }
            Err(err) => {
                warn!(repo, sha = %short_sha(sha), error = %err, "diff fetch failed");
                let detail = match err.status_code() {
                    Some(status) => format!("Error fetching diff: {status}"),
                    None => format!("Error fetching diff: {err}"),
                };
                DiffText::Failed(detail)
            }
        }
    }
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}
