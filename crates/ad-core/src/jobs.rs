//! Background job service: registry, admission control and workers.

use crate::error::{JobError, PipelineError, error_chain};
use crate::pipeline::{ChangelogPipeline, RunLog};
use crate::render::{completed_preview, completed_without_url_preview, error_preview};
use crate::types::{Job, JobId, JobStatus, LogLine};
use crate::validation::{validate_epic_key, validate_job_transition};
use ad_events::{EventBus, JobEvent, JobEventKind};
use chrono::Utc;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

struct JobState {
    job: Job,
    next_seq: u64,
}

impl JobState {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

type JobCell = RwLock<JobState>;

fn read(cell: &JobCell) -> std::sync::RwLockReadGuard<'_, JobState> {
    cell.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(cell: &JobCell) -> std::sync::RwLockWriteGuard<'_, JobState> {
    cell.write().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    jobs: RwLock<HashMap<JobId, Arc<JobCell>>>,
    pipeline: Arc<dyn ChangelogPipeline>,
    bus: EventBus,
    permits: Semaphore,
    workers: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

/// Owns every job for the lifetime of the service. Cloning yields another
/// handle to the same registry.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    /// `max_jobs` bounds how many pipelines run at once; further jobs stay
    /// in `starting` until a slot frees up.
    pub fn new(pipeline: Arc<dyn ChangelogPipeline>, bus: EventBus, max_jobs: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                pipeline,
                bus,
                permits: Semaphore::new(max_jobs.max(1)),
                workers: Mutex::new(JoinSet::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a job and starts its worker. Must be called from within a
    /// tokio runtime.
    pub fn submit(&self, epic_key: &str) -> Result<JobId, JobError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(JobError::ShuttingDown);
        }
        let epic_key = validate_epic_key(epic_key)?;

        let id = JobId::generate();
        let job = Job::new(id.clone(), epic_key);
        let first_line = job.logs.first().map(|line| line.message.clone());
        // The initial log line is already in the job, so it owns seq 0.
        let cell = Arc::new(RwLock::new(JobState { job, next_seq: 1 }));
        self.inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), cell.clone());

        let log = JobLog {
            id: id.clone(),
            cell,
            bus: self.inner.bus.clone(),
        };
        if let Some(message) = first_line {
            log.publish(0, JobEventKind::Log { message });
        }
        info!(job_id = %id, epic_key, "job submitted");

        let mut workers = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while workers.try_join_next().is_some() {}
        workers.spawn(run_job(self.inner.clone(), log, epic_key.to_string()));

        Ok(id)
    }

    /// Unknown and malformed ids are both reported as `NotFound`.
    pub fn get_status(&self, raw_id: &str) -> Result<Job, JobError> {
        self.cell(raw_id).map(|cell| read(&cell).job.clone())
    }

    /// The job plus the sequence number its next event will carry, read
    /// atomically so a subscriber can resume from the snapshot.
    pub fn snapshot(&self, raw_id: &str) -> Result<(Job, u64), JobError> {
        let cell = self.cell(raw_id)?;
        let state = read(&cell);
        Ok((state.job.clone(), state.next_seq))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.bus.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting jobs and waits for every running worker to finish.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut workers = std::mem::take(
            &mut *self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        info!(running = workers.len(), "waiting for jobs to finish");
        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "job worker failed");
            }
        }
    }

    fn cell(&self, raw_id: &str) -> Result<Arc<JobCell>, JobError> {
        let id = JobId::from_str(raw_id).map_err(|_| JobError::NotFound)?;
        self.inner
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound)
    }
}

/// The single writer of one job: appends log lines, moves the status and
/// mirrors both onto the event bus.
#[derive(Clone)]
pub struct JobLog {
    id: JobId,
    cell: Arc<JobCell>,
    bus: EventBus,
}

impl JobLog {
    fn transition(&self, to: JobStatus, preview: Option<String>) {
        let seq = {
            let mut state = write(&self.cell);
            if let Err(err) = validate_job_transition(state.job.status, to) {
                warn!(job_id = %self.id, error = %err, "ignoring status change");
                return;
            }
            state.job.status = to;
            if let Some(preview) = preview {
                state.job.preview_content = preview;
            }
            state.job.updated_at = Utc::now();
            state.take_seq()
        };
        info!(job_id = %self.id, status = to.as_str(), "job status changed");
        self.publish(
            seq,
            JobEventKind::Status {
                status: to.as_str().to_string(),
            },
        );
    }

    fn publish(&self, seq: u64, kind: JobEventKind) {
        self.bus.publish(JobEvent::new(self.id.as_str(), seq, kind));
    }
}

impl RunLog for JobLog {
    fn append(&self, message: String) {
        let seq = {
            let mut state = write(&self.cell);
            let now = Utc::now();
            state.job.logs.push(LogLine {
                at: now,
                message: message.clone(),
            });
            state.job.updated_at = now;
            state.take_seq()
        };
        info!(job_id = %self.id, "{message}");
        self.publish(seq, JobEventKind::Log { message });
    }
}

async fn run_job(inner: Arc<Inner>, log: JobLog, epic_key: String) {
    // The admission semaphore is never closed; queued jobs still run after
    // shutdown starts.
    let _permit = inner.permits.acquire().await.ok();

    log.transition(JobStatus::Processing, None);
    log.append(format!("Process started for Epic: {epic_key}..."));
    log.append(format!("Invoking changelog generation for Epic: {epic_key}..."));

    let pipeline = inner.pipeline.clone();
    let worker_log = log.clone();
    let key = epic_key.clone();
    let outcome = match tokio::spawn(async move { pipeline.run(&key, &worker_log).await }).await {
        Ok(outcome) => outcome,
        Err(err) => Err(PipelineError::Aborted {
            message: abort_message(err),
        }),
    };

    match outcome {
        Ok(url) => {
            log.append("Changelog generation successful.".to_string());
            let preview = match url {
                Some(url) => {
                    log.append(format!("Process completed successfully. Confluence page: {url}"));
                    completed_preview(&url)
                }
                None => {
                    log.append("Process completed, but no Confluence URL was provided.".to_string());
                    completed_without_url_preview()
                }
            };
            log.transition(JobStatus::Completed, Some(preview));
        }
        Err(err) => {
            error!(job_id = %log.id, epic_key = %epic_key, error = %err, "changelog generation failed");
            let mut lines = error_chain(&err).into_iter();
            if let Some(head) = lines.next() {
                log.append(format!("Error during changelog generation: {head}"));
            }
            for line in lines {
                log.append(line);
            }
            log.append(format!("Trace: {err:?}"));
            log.transition(JobStatus::Error, Some(error_preview()));
        }
    }
}

fn abort_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use std::time::Duration;

    enum Behaviour {
        Publish(Option<&'static str>),
        FailToPublish,
        Panic,
        Gated(Arc<Semaphore>),
    }

    struct StubPipeline(Behaviour);

    #[async_trait]
    impl ChangelogPipeline for StubPipeline {
        async fn run(
            &self,
            epic_key: &str,
            log: &dyn RunLog,
        ) -> Result<Option<String>, PipelineError> {
            log.append(format!("stub running {epic_key}"));
            match &self.0 {
                Behaviour::Publish(url) => Ok(url.map(str::to_string)),
                Behaviour::FailToPublish => Err(PipelineError::Publish {
                    source: RemoteError::Status {
                        status: 503,
                        body: "down".to_string(),
                    },
                }),
                Behaviour::Panic => panic!("stub exploded"),
                Behaviour::Gated(gate) => {
                    let _pass = gate.acquire().await;
                    Ok(Some("https://wiki/gated".to_string()))
                }
            }
        }
    }

    fn manager(behaviour: Behaviour, max_jobs: usize) -> JobManager {
        JobManager::new(Arc::new(StubPipeline(behaviour)), EventBus::new(64), max_jobs)
    }

    async fn wait_for(manager: &JobManager, id: &JobId, status: JobStatus) {
        for _ in 0..200 {
            if manager.get_status(id.as_str()).unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn successful_job_completes_with_link_preview() {
        let manager = manager(Behaviour::Publish(Some("https://wiki/pages/7")), 2);
        let id = manager.submit("EPIC-1").unwrap();
        manager.shutdown().await;

        let job = manager.get_status(id.as_str()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.preview_content.contains("href=\"https://wiki/pages/7\""));
        let logs: Vec<_> = job.log_messages().collect();
        assert_eq!(logs[0], "Request received for Epic: EPIC-1");
        assert_eq!(logs[1], "Process started for Epic: EPIC-1...");
        assert_eq!(logs[2], "Invoking changelog generation for Epic: EPIC-1...");
        assert_eq!(logs[3], "stub running EPIC-1");
        assert_eq!(
            logs.last().copied(),
            Some("Process completed successfully. Confluence page: https://wiki/pages/7")
        );
    }

    #[tokio::test]
    async fn missing_url_still_completes() {
        let manager = manager(Behaviour::Publish(None), 1);
        let id = manager.submit("EPIC-2").unwrap();
        manager.shutdown().await;

        let job = manager.get_status(id.as_str()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.preview_content.contains("no Confluence URL"));
        assert!(job
            .log_messages()
            .any(|m| m == "Process completed, but no Confluence URL was provided."));
    }

    #[tokio::test]
    async fn failure_records_chain_and_generic_preview() {
        let manager = manager(Behaviour::FailToPublish, 1);
        let id = manager.submit("EPIC-3").unwrap();
        manager.shutdown().await;

        let job = manager.get_status(id.as_str()).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.preview_content, error_preview());
        let logs: Vec<_> = job.log_messages().collect();
        assert!(logs.contains(&"Error during changelog generation: failed to publish changelog"));
        assert!(logs.contains(&"Caused by: http status 503: down"));
        let trace = logs.iter().find(|m| m.starts_with("Trace: ")).unwrap();
        assert!(trace.contains("Publish"));
        assert!(trace.contains("status: 503"));
        assert!(!job.preview_content.contains("503"));
    }

    #[tokio::test]
    async fn panicking_pipeline_marks_job_as_error() {
        let manager = manager(Behaviour::Panic, 1);
        let id = manager.submit("EPIC-4").unwrap();
        manager.shutdown().await;

        let job = manager.get_status(id.as_str()).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job
            .log_messages()
            .any(|m| m == "Error during changelog generation: pipeline task aborted: panicked: stub exploded"));
    }

    #[tokio::test]
    async fn blank_key_is_rejected_without_creating_a_job() {
        let manager = manager(Behaviour::Publish(None), 1);
        assert!(matches!(manager.submit("  "), Err(JobError::MissingEpicKey)));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let manager = manager(Behaviour::Publish(None), 1);
        assert!(matches!(
            manager.get_status("nonexistent-id"),
            Err(JobError::NotFound)
        ));
        let unknown = JobId::generate();
        assert!(matches!(
            manager.get_status(unknown.as_str()),
            Err(JobError::NotFound)
        ));
    }

    #[tokio::test]
    async fn admission_keeps_extra_jobs_starting() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager(Behaviour::Gated(gate.clone()), 1);
        let first = manager.submit("EPIC-A").unwrap();
        let second = manager.submit("EPIC-B").unwrap();

        wait_for(&manager, &first, JobStatus::Processing).await;
        assert_eq!(
            manager.get_status(second.as_str()).unwrap().status,
            JobStatus::Starting
        );

        gate.add_permits(1);
        manager.shutdown().await;
        for id in [&first, &second] {
            assert_eq!(
                manager.get_status(id.as_str()).unwrap().status,
                JobStatus::Completed
            );
        }
    }

    #[tokio::test]
    async fn events_mirror_logs_and_end_with_terminal_status() {
        let manager = manager(Behaviour::Publish(Some("https://wiki/x")), 1);
        let mut events = manager.subscribe();
        let id = manager.submit("EPIC-5").unwrap();
        manager.shutdown().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.job_id, id.as_str());
            seen.push(event);
        }
        assert!(seen.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(seen.last().unwrap().is_terminal());

        let (job, next_seq) = manager.snapshot(id.as_str()).unwrap();
        assert_eq!(next_seq, seen.len() as u64);
        let log_events = seen
            .iter()
            .filter(|e| matches!(e.kind, JobEventKind::Log { .. }))
            .count();
        assert_eq!(log_events, job.logs.len());
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_refused() {
        let manager = manager(Behaviour::Publish(None), 1);
        manager.shutdown().await;
        assert!(matches!(manager.submit("EPIC-6"), Err(JobError::ShuttingDown)));
    }
}
