use ad_core::JobManager;
use ad_core::error::JobError;
use ad_core::types::Job;
use ad_events::{JobEvent, JobEventKind};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// One `snapshot` event with the job as it stands, then its live `log` and
/// `status` events. The stream ends after a terminal status.
///
/// A subscriber that falls behind the bus gets a fresh `snapshot` in place
/// of the events it missed.
pub fn job_stream(jobs: &JobManager, raw_id: &str) -> Result<Response, JobError> {
    // Subscribe before the snapshot; events it already covers are dropped by seq.
    let receiver = jobs.subscribe();
    let (job, next_seq) = jobs.snapshot(raw_id)?;

    let snapshot = stream::iter([snapshot_event(&job)]);
    let live: BoxStream<'static, Event> = if job.status.is_terminal() {
        stream::empty().boxed()
    } else {
        let follow = Follow {
            jobs: jobs.clone(),
            job_id: job.id.to_string(),
            next_seq,
            events: BroadcastStream::new(receiver),
            finished: false,
        };
        stream::unfold(follow, Follow::next_event).boxed()
    };

    let stream = snapshot.chain(live).map(Ok::<Event, Infallible>);
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

struct Follow {
    jobs: JobManager,
    job_id: String,
    next_seq: u64,
    events: BroadcastStream<JobEvent>,
    finished: bool,
}

impl Follow {
    async fn next_event(mut self) -> Option<(Event, Self)> {
        if self.finished {
            return None;
        }
        loop {
            match self.events.next().await? {
                Ok(event) => {
                    if event.job_id != self.job_id || event.seq < self.next_seq {
                        continue;
                    }
                    self.next_seq = event.seq + 1;
                    self.finished = event.is_terminal();
                    return Some((live_event(&event), self));
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(job_id = %self.job_id, skipped, "event subscriber lagged; resending snapshot");
                    let (job, next_seq) = self.jobs.snapshot(&self.job_id).ok()?;
                    self.next_seq = next_seq;
                    self.finished = job.status.is_terminal();
                    return Some((snapshot_event(&job), self));
                }
            }
        }
    }
}

fn snapshot_event(job: &Job) -> Event {
    let json = serde_json::to_string(job).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("snapshot").data(json)
}

fn live_event(event: &JobEvent) -> Event {
    let name = match event.kind {
        JobEventKind::Log { .. } => "log",
        JobEventKind::Status { .. } => "status",
    };
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .event(name)
        .id(event.seq.to_string())
        .data(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_core::error::PipelineError;
    use ad_core::types::JobStatus;
    use ad_core::{ChangelogPipeline, RunLog};
    use ad_events::EventBus;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// `EPIC-SLOW` waits for the gate; any other epic logs a burst of lines.
    struct BurstPipeline {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ChangelogPipeline for BurstPipeline {
        async fn run(
            &self,
            epic_key: &str,
            log: &dyn RunLog,
        ) -> Result<Option<String>, PipelineError> {
            if epic_key == "EPIC-SLOW" {
                let _pass = self.gate.acquire().await;
            } else {
                for i in 0..20 {
                    log.append(format!("burst line {i}"));
                }
            }
            Ok(None)
        }
    }

    async fn wait_for(jobs: &JobManager, id: &str, status: JobStatus) {
        for _ in 0..400 {
            if jobs.get_status(id).unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached {status:?}");
    }

    async fn body_text(response: Response) -> String {
        let bytes = tokio::time::timeout(
            Duration::from_secs(3),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("event stream did not end")
        .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn lagging_subscriber_resyncs_and_ends_after_completion() {
        let gate = Arc::new(Semaphore::new(0));
        let jobs = JobManager::new(
            Arc::new(BurstPipeline { gate: gate.clone() }),
            EventBus::new(8),
            2,
        );
        let slow = jobs.submit("EPIC-SLOW").unwrap();
        wait_for(&jobs, slow.as_str(), JobStatus::Processing).await;

        let response = job_stream(&jobs, slow.as_str()).unwrap();

        gate.add_permits(1);
        wait_for(&jobs, slow.as_str(), JobStatus::Completed).await;
        let noisy = jobs.submit("EPIC-NOISY").unwrap();
        wait_for(&jobs, noisy.as_str(), JobStatus::Completed).await;

        let text = body_text(response).await;
        assert!(text.matches("event: snapshot").count() >= 2);
        let last_snapshot = text.rsplit("event: snapshot").next().unwrap();
        assert!(last_snapshot.contains("\"status\":\"completed\""));
        assert!(!text.contains(noisy.as_str()));
    }

    #[tokio::test]
    async fn live_events_follow_the_snapshot_until_terminal() {
        let gate = Arc::new(Semaphore::new(0));
        let jobs = JobManager::new(
            Arc::new(BurstPipeline { gate: gate.clone() }),
            EventBus::new(256),
            1,
        );
        let slow = jobs.submit("EPIC-SLOW").unwrap();
        wait_for(&jobs, slow.as_str(), JobStatus::Processing).await;

        let response = job_stream(&jobs, slow.as_str()).unwrap();
        gate.add_permits(1);

        let text = body_text(response).await;
        assert_eq!(text.matches("event: snapshot").count(), 1);
        assert!(text.contains("event: log"));
        assert!(text.contains("Process completed, but no Confluence URL was provided."));
        let last_event = text.rsplit("event: ").next().unwrap();
        assert!(last_event.starts_with("status"));
        assert!(last_event.contains("\"status\":\"completed\""));
    }
}
