use crate::error::RemoteError;
use async_trait::async_trait;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a page and returns its URL when the backend reports one.
    async fn publish(&self, title: &str, html: &str) -> Result<Option<String>, RemoteError>;
    /// Links a published page back to the originating issue.
    async fn annotate(&self, url: &str, issue_key: &str) -> Result<(), RemoteError>;
}
