use ad_core::error::RemoteError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Basic-auth pair shared by the Jira and Confluence clients.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn build_client(timeout: Duration) -> Result<Client, RemoteError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("autodoc/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| RemoteError::NotConfigured {
            message: format!("cannot build http client: {err}"),
        })
}

pub fn transport(err: &reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        message: err.to_string(),
    }
}

/// Turns a non-2xx response into `RemoteError::Status` carrying the body.
pub async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = ensure_success(response)
        .await?
        .bytes()
        .await
        .map_err(|err| transport(&err))?;
    serde_json::from_slice(&bytes).map_err(|err| RemoteError::Decode {
        message: err.to_string(),
    })
}

pub async fn read_text(response: Response) -> Result<String, RemoteError> {
    ensure_success(response)
        .await?
        .text()
        .await
        .map_err(|err| transport(&err))
}

pub fn trim_base(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}
