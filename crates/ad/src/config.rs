use std::path::PathBuf;
use std::sync::Arc;

use ad_archive::SqliteArchive;
use ad_clients::gemini::DEFAULT_MODEL;
use ad_clients::{ConfluencePublisher, Credentials, GeminiGenerator, GitHubClient, JiraClient};
use ad_core::{Pipeline, PipelineSettings, SummaryFormat};
use anyhow::{Context, Result, anyhow};
use clap::Args;

/// Collaborator credentials and pipeline tuning. Every flag falls back to
/// its environment variable; credentials are checked when a pipeline is
/// built, not at parse time.
#[derive(Args)]
pub struct Config {
    #[arg(long, env = "JIRA_SERVER")]
    pub jira_server: Option<String>,
    #[arg(long, env = "JIRA_USERNAME")]
    pub jira_username: Option<String>,
    #[arg(long, env = "JIRA_PASSWORD", hide_env_values = true)]
    pub jira_password: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
    #[arg(long = "github-org", env = "GITHUB_ORG_NAME")]
    pub github_org: Option<String>,
    /// Only repositories whose name starts with this prefix are scanned.
    #[arg(long, env = "GITHUB_REPO_PREFIX", default_value = "")]
    pub repo_prefix: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "CONFLUENCE_BASE_URL")]
    pub confluence_base_url: Option<String>,
    #[arg(long, env = "SPACE_KEY")]
    pub space_key: Option<String>,

    #[arg(long, env = "AUTODOC_DB_PATH", default_value = ".autodoc/archive.db")]
    pub db_path: PathBuf,
    #[arg(long, env = "AUTODOC_SUMMARY_FORMAT", default_value = "markdown")]
    pub summary_format: SummaryFormat,
    #[arg(long, env = "AUTODOC_SUMMARY_CONCURRENCY", default_value_t = 1)]
    pub summary_concurrency: usize,
}

impl Config {
    /// `output_path` is only set by foreground runs; jobs served over HTTP
    /// never share an output file.
    pub fn settings(&self, scan: bool, output_path: Option<PathBuf>) -> PipelineSettings {
        PipelineSettings {
            repo_prefix: self.repo_prefix.clone(),
            scan,
            format: self.summary_format,
            concurrency: self.summary_concurrency.max(1),
            output_path,
        }
    }

    pub fn build_pipeline(&self, settings: PipelineSettings) -> Result<Pipeline> {
        let jira_server = required(self.jira_server.as_deref(), "JIRA_SERVER")?;
        let credentials = Credentials {
            username: required(self.jira_username.as_deref(), "JIRA_USERNAME")?.to_string(),
            password: required(self.jira_password.as_deref(), "JIRA_PASSWORD")?.to_string(),
        };

        let tracker = JiraClient::new(jira_server, credentials.clone())?;
        let source = GitHubClient::new(
            required(self.github_token.as_deref(), "GITHUB_TOKEN")?,
            required(self.github_org.as_deref(), "GITHUB_ORG_NAME")?,
        )?;
        let generator = GeminiGenerator::new(
            required(self.google_api_key.as_deref(), "GOOGLE_API_KEY")?,
            self.gemini_model.as_str(),
        )?;
        let publisher = ConfluencePublisher::new(
            required(self.confluence_base_url.as_deref(), "CONFLUENCE_BASE_URL")?,
            required(self.space_key.as_deref(), "SPACE_KEY")?,
            credentials.clone(),
            JiraClient::new(jira_server, credentials)?,
        )?;
        let archive = SqliteArchive::open(&self.db_path)
            .with_context(|| format!("failed to open archive at {}", self.db_path.display()))?;

        Ok(Pipeline::new(
            Arc::new(tracker),
            Arc::new(source),
            Arc::new(generator),
            Arc::new(publisher),
            Arc::new(archive),
            settings,
        ))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("{name} is not set"))
}
