use crate::error::{JobError, TransitionError};
use crate::types::JobStatus;

pub fn validate_epic_key(raw: &str) -> Result<&str, JobError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(JobError::MissingEpicKey);
    }
    Ok(key)
}

pub fn validate_job_transition(from: JobStatus, to: JobStatus) -> Result<(), TransitionError> {
    use JobStatus::{Completed, Error, Processing, Starting};

    let valid = matches!(
        (from, to),
        (Starting, Processing) | (Processing, Completed) | (Starting | Processing, Error)
    );

    if valid {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}
