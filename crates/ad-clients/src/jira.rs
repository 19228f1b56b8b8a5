use ad_core::error::RemoteError;
use ad_core::tracker::IssueTracker;
use ad_core::types::{CardMetadata, EpicMetadata};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::http::{
    Credentials, DEFAULT_TIMEOUT, build_client, ensure_success, read_json, transport, trim_base,
};

const SEARCH_PAGE_SIZE: usize = 50;
const UNASSIGNED: &str = "Unassigned";

/// Jira REST v2 client authenticated with basic auth.
pub struct JiraClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    description: Option<String>,
    status: Option<NamedField>,
    assignee: Option<Assignee>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Assignee {
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    issues: Vec<SearchHit>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    key: String,
}

impl JiraClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base(base_url),
            credentials,
        })
    }

    async fn issue(&self, key: &str) -> Result<Issue, RemoteError> {
        debug!(issue = key, "fetching issue");
        let response = self
            .client
            .get(format!("{}/rest/api/2/issue/{key}", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .query(&[("fields", "summary,description,status,assignee")])
            .send()
            .await
            .map_err(|err| transport(&err))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                what: format!("issue {key}"),
            });
        }
        read_json(response).await
    }

    /// Posts the "page created" comment on an issue.
    pub async fn add_comment(&self, issue_key: &str, page_url: &str) -> Result<(), RemoteError> {
        let body = json!({
            "body": format!(
                "(AI Generated Content) New technical documentation page created on Confluence: {page_url}"
            ),
        });
        let response = self
            .client
            .post(format!("{}/rest/api/2/issue/{issue_key}/comment", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&body)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        ensure_success(response).await?;
        info!(issue = issue_key, "comment added");
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn get_epic(&self, key: &str) -> Result<EpicMetadata, RemoteError> {
        let issue = self.issue(key).await?;
        Ok(EpicMetadata {
            id: issue.key,
            title: issue.fields.summary,
            description: issue.fields.description.unwrap_or_default(),
            status: issue.fields.status.map(|s| s.name).unwrap_or_default(),
            cards: Vec::new(),
        })
    }

    async fn linked_issue_keys(&self, epic_key: &str) -> Result<Vec<String>, RemoteError> {
        let jql = format!("parent = {epic_key}");
        let mut keys = Vec::new();
        loop {
            let start_at = keys.len().to_string();
            let max_results = SEARCH_PAGE_SIZE.to_string();
            let response = self
                .client
                .get(format!("{}/rest/api/2/search", self.base_url))
                .basic_auth(&self.credentials.username, Some(&self.credentials.password))
                .query(&[
                    ("jql", jql.as_str()),
                    ("fields", "key"),
                    ("startAt", start_at.as_str()),
                    ("maxResults", max_results.as_str()),
                ])
                .send()
                .await
                .map_err(|err| transport(&err))?;
            let page: SearchPage = read_json(response).await?;
            if page.issues.is_empty() {
                break;
            }
            keys.extend(page.issues.into_iter().map(|hit| hit.key));
            if keys.len() >= page.total {
                break;
            }
        }
        info!(epic_key, count = keys.len(), "linked issues found");
        Ok(keys)
    }

    async fn get_card(&self, key: &str) -> Result<CardMetadata, RemoteError> {
        let issue = self.issue(key).await?;
        Ok(CardMetadata {
            id: issue.key,
            title: issue.fields.summary,
            description: issue.fields.description.unwrap_or_default(),
            status: issue.fields.status.map(|s| s.name).unwrap_or_default(),
            assignee: issue
                .fields
                .assignee
                .map_or_else(|| UNASSIGNED.to_string(), |a| a.display_name),
        })
    }
}
