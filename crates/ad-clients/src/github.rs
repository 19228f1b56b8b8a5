use ad_core::error::RemoteError;
use ad_core::source::{CommitSummary, RepoSummary, SourceHost};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::http::{DEFAULT_TIMEOUT, build_client, read_json, read_text, transport, trim_base};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// GitHub REST v3 client scoped to one organization.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: String,
    org: String,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    date: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, org: impl Into<String>) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            org: org.into(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(base_url);
        self
    }

    fn get(&self, url: String, accept: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .header(ACCEPT, accept)
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn list_repos_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepoSummary>, RemoteError> {
        debug!(org = %self.org, page, "listing repositories");
        let response = self
            .get(format!("{}/orgs/{}/repos", self.base_url, self.org), JSON_MEDIA_TYPE)
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await
            .map_err(|err| transport(&err))?;
        let repos: Vec<RepoEntry> = read_json(response).await?;
        Ok(repos
            .into_iter()
            .map(|repo| RepoSummary { name: repo.name })
            .collect())
    }

    async fn list_commits_page(
        &self,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>, RemoteError> {
        debug!(repo, page, "listing commits");
        let response = self
            .get(
                format!("{}/repos/{}/{repo}/commits", self.base_url, self.org),
                JSON_MEDIA_TYPE,
            )
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await
            .map_err(|err| transport(&err))?;
        let commits: Vec<CommitEntry> = read_json(response).await?;
        Ok(commits
            .into_iter()
            .map(|entry| CommitSummary {
                sha: entry.sha,
                message: entry.commit.message,
                date: entry.commit.author.map(|a| a.date).unwrap_or_default(),
            })
            .collect())
    }

    async fn get_diff(&self, repo: &str, sha: &str) -> Result<String, RemoteError> {
        let response = self
            .get(
                format!("{}/repos/{}/{repo}/commits/{sha}", self.base_url, self.org),
                DIFF_MEDIA_TYPE,
            )
            .send()
            .await
            .map_err(|err| transport(&err))?;
        read_text(response).await
    }
}
