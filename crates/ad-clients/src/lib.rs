//! HTTP implementations of the collaborator traits in `ad-core`.

pub mod confluence;
pub mod gemini;
pub mod github;
pub mod http;
pub mod jira;

pub use confluence::ConfluencePublisher;
pub use gemini::GeminiGenerator;
pub use github::GitHubClient;
pub use http::Credentials;
pub use jira::JiraClient;
