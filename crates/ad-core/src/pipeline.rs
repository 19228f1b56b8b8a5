use crate::aggregate::build_epic;
use crate::archive::DiffArchive;
use crate::error::PipelineError;
use crate::generator::TextGenerator;
use crate::publisher::Publisher;
use crate::render::{page_title, storage_html};
use crate::scan::RepositoryScanner;
use crate::source::SourceHost;
use crate::summarize::{HierarchicalSummarizer, SummaryFormat};
use crate::tracker::IssueTracker;
use crate::types::EpicMetadata;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Sink for the human-readable progress lines of one run.
pub trait RunLog: Send + Sync {
    fn append(&self, message: String);
}

/// Runs the changelog generation for one epic and returns the published
/// page URL, if the publisher reported one.
#[async_trait]
pub trait ChangelogPipeline: Send + Sync {
    async fn run(&self, epic_key: &str, log: &dyn RunLog) -> Result<Option<String>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub repo_prefix: String,
    /// When false, cards are aggregated from whatever is already archived.
    pub scan: bool,
    pub format: SummaryFormat,
    pub concurrency: usize,
    pub output_path: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            repo_prefix: String::new(),
            scan: true,
            format: SummaryFormat::default(),
            concurrency: 1,
            output_path: None,
        }
    }
}

pub struct Pipeline {
    tracker: Arc<dyn IssueTracker>,
    source: Arc<dyn SourceHost>,
    generator: Arc<dyn TextGenerator>,
    publisher: Arc<dyn Publisher>,
    archive: Arc<dyn DiffArchive>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        source: Arc<dyn SourceHost>,
        generator: Arc<dyn TextGenerator>,
        publisher: Arc<dyn Publisher>,
        archive: Arc<dyn DiffArchive>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tracker,
            source,
            generator,
            publisher,
            archive,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    async fn fetch_metadata(
        &self,
        epic_key: &str,
        log: &dyn RunLog,
    ) -> Result<EpicMetadata, PipelineError> {
        log.append(format!("Fetching epic {epic_key} from the issue tracker..."));
        let mut epic = self
            .tracker
            .get_epic(epic_key)
            .await
            .map_err(|source| PipelineError::Epic {
                key: epic_key.to_string(),
                source,
            })?;

        let keys = self
            .tracker
            .linked_issue_keys(epic_key)
            .await
            .map_err(|source| PipelineError::LinkedIssues {
                key: epic_key.to_string(),
                source,
            })?;
        log.append(format!("Found {} issues linked to epic {epic_key}", keys.len()));

        for key in keys {
            match self.tracker.get_card(&key).await {
                Ok(card) => epic.cards.push(card),
                Err(err) => {
                    warn!(card_id = %key, error = %err, "skipping card without metadata");
                    log.append(format!("Skipping card {key}: {err}"));
                }
            }
        }
        log.append(format!(
            "Collected metadata for {} cards of epic {}: {}",
            epic.cards.len(),
            epic.id,
            epic.title
        ));
        Ok(epic)
    }

    async fn scan_cards(&self, epic: &EpicMetadata, log: &dyn RunLog) -> Result<(), PipelineError> {
        let scanner = RepositoryScanner::new(&*self.source);
        for card in &epic.cards {
            log.append(format!("Scanning repositories for card {}...", card.id));
            let results = scanner
                .scan(&card.id, &self.settings.repo_prefix)
                .await
                .map_err(|source| PipelineError::Scan {
                    card_id: card.id.clone(),
                    source,
                })?;
            let failed = results.iter().filter(|r| r.diff.is_failed()).count();
            let archived = self
                .archive
                .save(&card.id, results)
                .map_err(|source| PipelineError::Archive {
                    card_id: card.id.clone(),
                    source,
                })?;
            let mut line = format!(
                "Archived {} commits from {} repositories for card {}",
                archived.commit_count(),
                archived.groups.len(),
                card.id
            );
            if failed > 0 {
                line.push_str(&format!(" ({failed} diffs could not be fetched)"));
            }
            log.append(line);
        }
        Ok(())
    }

    async fn write_output(&self, summary: &str, log: &dyn RunLog) -> Result<(), PipelineError> {
        let Some(path) = &self.settings.output_path else {
            return Ok(());
        };
        tokio::fs::write(path, summary)
            .await
            .map_err(|source| PipelineError::Output {
                path: path.display().to_string(),
                source,
            })?;
        log.append(format!("Changelog written to {}", path.display()));
        Ok(())
    }
}

#[async_trait]
impl ChangelogPipeline for Pipeline {
    async fn run(&self, epic_key: &str, log: &dyn RunLog) -> Result<Option<String>, PipelineError> {
        info!(epic_key, scan = self.settings.scan, "pipeline started");
        let metadata = self.fetch_metadata(epic_key, log).await?;

        if self.settings.scan {
            self.scan_cards(&metadata, log).await?;
        } else {
            log.append("Repository scan disabled; using archived diffs".to_string());
        }

        let epic = build_epic(&metadata, &*self.archive);
        log.append(format!(
            "Aggregated {} cards with {} commits",
            epic.cards.len(),
            epic.commit_count()
        ));

        log.append(format!("Summarizing epic {}...", epic.id));
        let summary = HierarchicalSummarizer::new(&*self.generator, self.settings.format)
            .with_concurrency(self.settings.concurrency)
            .summarize_epic(&epic)
            .await?;
        log.append(format!("Summary generated ({} characters)", summary.chars().count()));

        self.write_output(&summary, log).await?;

        let title = page_title(&epic.id, &epic.title);
        let html = storage_html(&summary, self.settings.format);
        log.append(format!("Publishing changelog page \"{title}\"..."));
        let url = self
            .publisher
            .publish(&title, &html)
            .await
            .map_err(|source| PipelineError::Publish { source })?;

        match &url {
            Some(url) => {
                log.append(format!("Published changelog page: {url}"));
                match self.publisher.annotate(url, epic_key).await {
                    Ok(()) => log.append(format!("Linked changelog page to {epic_key}")),
                    Err(err) => {
                        warn!(epic_key, error = %err, "failed to annotate issue");
                        log.append(format!("Warning: could not comment on {epic_key}: {err}"));
                    }
                }
            }
            None => log.append("Publisher returned no page URL".to_string()),
        }

        info!(epic_key, url = url.as_deref().unwrap_or(""), "pipeline finished");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakePublisher, FakeSourceHost, FakeTracker, MemoryArchive, ScriptedGenerator};
    use crate::types::{DiffText, ScanResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl RunLog for Lines {
        fn append(&self, message: String) {
            self.0.lock().unwrap().push(message);
        }
    }

    impl Lines {
        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Harness {
        tracker: FakeTracker,
        source: FakeSourceHost,
        generator: Arc<ScriptedGenerator>,
        publisher: Arc<FakePublisher>,
        archive: Arc<MemoryArchive>,
        settings: PipelineSettings,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tracker: FakeTracker::new()
                    .with_epic("EPIC-1", "Payments", "Rework payments")
                    .with_card("EPIC-1", "CARD-1", "Add refunds"),
                source: FakeSourceHost::new()
                    .with_repo_page(&["svc-pay"])
                    .with_commit_page("svc-pay", &[("abcdef0123", "CARD-1 refunds")])
                    .with_diff("abcdef0123", "+refund();"),
                generator: Arc::new(ScriptedGenerator::new()),
                publisher: Arc::new(FakePublisher::returning("https://wiki/pages/1")),
                archive: Arc::new(MemoryArchive::new()),
                settings: PipelineSettings {
                    repo_prefix: "svc-".to_string(),
                    ..PipelineSettings::default()
                },
            }
        }

        fn build(self) -> (Pipeline, Arc<ScriptedGenerator>, Arc<FakePublisher>, Arc<MemoryArchive>) {
            let pipeline = Pipeline::new(
                Arc::new(self.tracker),
                Arc::new(self.source),
                self.generator.clone(),
                self.publisher.clone(),
                self.archive.clone(),
                self.settings,
            );
            (pipeline, self.generator, self.publisher, self.archive)
        }
    }

    #[tokio::test]
    async fn scans_summarizes_publishes_and_annotates() {
        let (pipeline, generator, publisher, archive) = Harness::new().build();
        let log = Lines::default();

        let url = pipeline.run("EPIC-1", &log).await.unwrap();

        assert_eq!(url.as_deref(), Some("https://wiki/pages/1"));
        assert!(archive.contains("CARD-1"));
        assert_eq!(generator.prompts().len(), 3);
        assert!(generator.prompts()[0].contains("+refund();"));
        let published = publisher.published();
        assert_eq!(published[0].0, "EPIC-1 - Payments: Engineering Changelog");
        assert_eq!(published[0].1, "<pre>summary #3</pre>");
        assert_eq!(
            publisher.annotations(),
            vec![("https://wiki/pages/1".to_string(), "EPIC-1".to_string())]
        );
        let lines = log.all();
        assert!(lines.iter().any(|l| l == "Archived 1 commits from 1 repositories for card CARD-1"));
        assert!(lines.iter().any(|l| l == "Published changelog page: https://wiki/pages/1"));
    }

    #[tokio::test]
    async fn repository_listing_failure_aborts_without_archiving() {
        let mut harness = Harness::new();
        harness.source = FakeSourceHost::new().failing_repo_listing();
        let (pipeline, generator, publisher, archive) = harness.build();

        let err = pipeline.run("EPIC-1", &Lines::default()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Scan { ref card_id, .. } if card_id == "CARD-1"));
        assert!(archive.is_empty());
        assert!(generator.prompts().is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn missing_url_skips_annotation() {
        let mut harness = Harness::new();
        harness.publisher = Arc::new(FakePublisher::without_url());
        let (pipeline, _, publisher, _) = harness.build();
        let log = Lines::default();

        let url = pipeline.run("EPIC-1", &log).await.unwrap();

        assert!(url.is_none());
        assert!(publisher.annotations().is_empty());
        assert!(log.all().contains(&"Publisher returned no page URL".to_string()));
    }

    #[tokio::test]
    async fn cards_without_metadata_are_skipped() {
        let mut harness = Harness::new();
        harness.tracker = FakeTracker::new()
            .with_epic("EPIC-1", "Payments", "")
            .with_dangling_link("EPIC-1", "CARD-404")
            .with_card("EPIC-1", "CARD-1", "Add refunds");
        let (pipeline, generator, _, _) = harness.build();
        let log = Lines::default();

        pipeline.run("EPIC-1", &log).await.unwrap();

        assert!(log.all().iter().any(|l| l.starts_with("Skipping card CARD-404")));
        let epic_prompt = generator.last_prompt().unwrap();
        assert!(epic_prompt.contains("### CARD-1 - Add refunds"));
        assert!(!epic_prompt.contains("CARD-404"));
    }

    #[tokio::test]
    async fn annotation_failure_is_not_fatal() {
        let mut harness = Harness::new();
        harness.publisher = Arc::new(FakePublisher::returning("https://wiki/pages/2").failing_annotate());
        let (pipeline, _, _, _) = harness.build();
        let log = Lines::default();

        let url = pipeline.run("EPIC-1", &log).await.unwrap();

        assert_eq!(url.as_deref(), Some("https://wiki/pages/2"));
        assert!(log.all().iter().any(|l| l.starts_with("Warning: could not comment on EPIC-1")));
    }

    #[tokio::test]
    async fn linked_issue_failure_is_fatal() {
        let mut harness = Harness::new();
        harness.tracker = FakeTracker::new()
            .with_epic("EPIC-1", "Payments", "")
            .failing_links("EPIC-1");
        let (pipeline, _, _, _) = harness.build();

        let err = pipeline.run("EPIC-1", &Lines::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::LinkedIssues { .. }));
    }

    #[tokio::test]
    async fn no_scan_mode_reads_the_existing_archive() {
        let mut harness = Harness::new();
        harness.source = FakeSourceHost::new().failing_repo_listing();
        harness.settings.scan = false;
        harness
            .archive
            .save(
                "CARD-1",
                vec![ScanResult {
                    repo: "svc-pay".to_string(),
                    sha: "abcdef0".to_string(),
                    message: "CARD-1".to_string(),
                    date: "2024-05-01T12:00:00Z".to_string(),
                    diff: DiffText::Fetched("0123456789".to_string()),
                }],
            )
            .unwrap();
        let (pipeline, generator, _, _) = harness.build();

        let url = pipeline.run("EPIC-1", &Lines::default()).await.unwrap();

        assert!(url.is_some());
        assert!(generator.prompts()[0].contains("0123456789"));
    }

    #[tokio::test]
    async fn summary_is_written_to_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        let mut harness = Harness::new();
        harness.settings.output_path = Some(path.clone());
        let (pipeline, _, _, _) = harness.build();

        pipeline.run("EPIC-1", &Lines::default()).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "summary #3");
    }
}
