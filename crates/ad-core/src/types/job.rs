use crate::types::ids::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// One asynchronous execution of the changelog pipeline for one epic key.
///
/// Only the worker running the job mutates it; status queries read clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub epic_key: String,
    pub status: JobStatus,
    pub logs: Vec<LogLine>,
    pub preview_content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, epic_key: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            epic_key: epic_key.to_string(),
            status: JobStatus::Starting,
            logs: vec![LogLine {
                at: now,
                message: format!("Request received for Epic: {epic_key}"),
            }],
            preview_content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn log_messages(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(|line| line.message.as_str())
    }
}
