use ad_core::error::RemoteError;
use ad_core::publisher::Publisher;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::http::{Credentials, DEFAULT_TIMEOUT, build_client, read_json, transport, trim_base};
use crate::jira::JiraClient;

/// Publishes pages into one Confluence space and comments the page link
/// back onto the Jira issue.
pub struct ConfluencePublisher {
    client: Client,
    base_url: String,
    space_key: String,
    credentials: Credentials,
    jira: JiraClient,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    #[serde(rename = "_links")]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    webui: Option<String>,
}

impl ConfluencePublisher {
    pub fn new(
        base_url: impl Into<String>,
        space_key: impl Into<String>,
        credentials: Credentials,
        jira: JiraClient,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base(base_url),
            space_key: space_key.into(),
            credentials,
            jira,
        })
    }
}

#[async_trait]
impl Publisher for ConfluencePublisher {
    async fn publish(&self, title: &str, html: &str) -> Result<Option<String>, RemoteError> {
        let payload = json!({
            "type": "page",
            "title": title,
            "space": { "key": self.space_key },
            "body": {
                "storage": {
                    "value": html,
                    "representation": "storage",
                },
            },
        });
        let response = self
            .client
            .post(format!("{}/rest/api/content", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        let page: CreatedPage = read_json(response).await?;

        let url = page
            .links
            .and_then(|links| links.webui)
            .map(|webui| format!("{}{webui}", self.base_url));
        match &url {
            Some(url) => info!(title, url = %url, "page published"),
            None => warn!(title, "page published without a web link"),
        }
        Ok(url)
    }

    async fn annotate(&self, url: &str, issue_key: &str) -> Result<(), RemoteError> {
        self.jira.add_comment(issue_key, url).await
    }
}
