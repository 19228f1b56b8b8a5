use crate::types::JobStatus;
use thiserror::Error;

/// Failure reported by an external collaborator (tracker, source host,
/// text generator, publisher).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("decode error: {message}")]
    Decode { message: String },
    #[error("not found: {what}")]
    NotFound { what: String },
    #[error("not configured: {message}")]
    NotConfigured { message: String },
}

impl RemoteError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list repositories with prefix '{prefix}'")]
    ListRepos {
        prefix: String,
        #[source]
        source: RemoteError,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no archive for card {card_id}")]
    NotFound { card_id: String },
    #[error("archive storage error: {message}")]
    Storage { message: String },
    #[error("archive decode failed: {message}")]
    Decode { message: String },
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("failed to summarize {level} {id}")]
    Generate {
        level: &'static str,
        id: String,
        #[source]
        source: RemoteError,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch epic {key}")]
    Epic {
        key: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to fetch issues linked to epic {key}")]
    LinkedIssues {
        key: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to scan repositories for card {card_id}")]
    Scan {
        card_id: String,
        #[source]
        source: ScanError,
    },
    #[error("failed to archive scan results for card {card_id}")]
    Archive {
        card_id: String,
        #[source]
        source: ArchiveError,
    },
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("failed to write changelog to {path}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to publish changelog")]
    Publish {
        #[source]
        source: RemoteError,
    },
    #[error("pipeline task aborted: {message}")]
    Aborted { message: String },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("epicKey is required")]
    MissingEpicKey,
    #[error("Invalid job ID")]
    NotFound,
    #[error("job service is shutting down")]
    ShuttingDown,
}

/// A status change the job lifecycle does not allow. Internal to the job
/// worker; never reported to callers.
#[derive(Debug, Error)]
#[error("invalid transition from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Renders an error and every `source()` beneath it, one line per level.
pub fn error_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        lines.push(format!("Caused by: {cause}"));
        current = cause.source();
    }
    lines
}
