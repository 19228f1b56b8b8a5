use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use utoipa::ToSchema;

/// One observable change to a job: a new log line or a status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub id: String,
    pub job_id: String,
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEventKind {
    Log { message: String },
    Status { status: String },
}

impl JobEvent {
    pub fn new(job_id: impl Into<String>, seq: u64, kind: JobEventKind) -> Self {
        Self {
            id: format!("evt_{}", Ulid::new()),
            job_id: job_id.into(),
            seq,
            at: Utc::now(),
            kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            &self.kind,
            JobEventKind::Status { status } if status == "completed" || status == "error"
        )
    }
}
