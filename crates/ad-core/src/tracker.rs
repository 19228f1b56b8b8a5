use crate::error::RemoteError;
use crate::types::{CardMetadata, EpicMetadata};
use async_trait::async_trait;

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Epic fields only; `cards` is left empty.
    async fn get_epic(&self, key: &str) -> Result<EpicMetadata, RemoteError>;
    /// Keys of issues whose parent is the epic, in the tracker's query order.
    async fn linked_issue_keys(&self, epic_key: &str) -> Result<Vec<String>, RemoteError>;
    async fn get_card(&self, key: &str) -> Result<CardMetadata, RemoteError>;
}
