use crate::error::RemoteError;
use async_trait::async_trait;

/// Text-generation backend. One prompt in, one completion out; retries, if
/// any, are the implementation's business.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError>;
}
