use crate::error::SummarizeError;
use crate::generator::TextGenerator;
use crate::prompts::{card_prompt, commit_prompt, epic_prompt};
use crate::types::{Card, Commit, Epic};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Diffs longer than this many characters are cut before prompting.
pub const MAX_DIFF_CHARS: usize = 3000;

/// Output contract requested from the card and epic prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    Table,
    Xhtml,
}

impl SummaryFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Table => "table",
            Self::Xhtml => "xhtml",
        }
    }
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "table" => Ok(Self::Table),
            "xhtml" | "html" => Ok(Self::Xhtml),
            other => Err(format!(
                "unknown summary format '{other}' (expected markdown, table or xhtml)"
            )),
        }
    }
}

pub fn truncate_diff(diff: &str) -> &str {
    match diff.char_indices().nth(MAX_DIFF_CHARS) {
        Some((end, _)) => &diff[..end],
        None => diff,
    }
}

/// Bottom-up reduction of an epic: commits, then cards, then the epic.
///
/// With `concurrency > 1` independent prompts run in parallel, and at most
/// `concurrency` generator calls are in flight across all levels. Results
/// are always folded in the epic's card order and each card's commit order.
pub struct HierarchicalSummarizer<'a, G: TextGenerator + ?Sized> {
    generator: &'a G,
    format: SummaryFormat,
    concurrency: usize,
    permits: Semaphore,
}

impl<'a, G: TextGenerator + ?Sized> HierarchicalSummarizer<'a, G> {
    pub fn new(generator: &'a G, format: SummaryFormat) -> Self {
        Self {
            generator,
            format,
            concurrency: 1,
            permits: Semaphore::new(1),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self.permits = Semaphore::new(self.concurrency);
        self
    }

    pub async fn summarize_epic(&self, epic: &Epic) -> Result<String, SummarizeError> {
        info!(epic_id = %epic.id, cards = epic.cards.len(), format = %self.format, "summarizing epic");
        let pending: Vec<_> = epic.cards.iter().map(|card| self.summarize_card(card)).collect();
        let summaries: Vec<String> = stream::iter(pending)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let blocks: Vec<(&str, &str, String)> = epic
            .cards
            .iter()
            .zip(summaries)
            .map(|(card, summary)| (card.id.as_str(), card.title.as_str(), summary))
            .collect();
        let prompt = epic_prompt(&epic.title, &epic.description, &blocks, self.format);
        self.generate(&prompt, "epic", &epic.id).await
    }

    async fn summarize_card(&self, card: &Card) -> Result<String, SummarizeError> {
        debug!(card_id = %card.id, commits = card.commits.len(), "summarizing card");
        let pending: Vec<_> = card
            .commits
            .iter()
            .map(|commit| self.summarize_commit(commit))
            .collect();
        let summaries: Vec<String> = stream::iter(pending)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let blocks: Vec<(&str, &str, String)> = card
            .commits
            .iter()
            .zip(summaries)
            .map(|(commit, summary)| (commit.repo.as_str(), commit.sha.as_str(), summary))
            .collect();
        let prompt = card_prompt(&card.title, &card.description, &blocks, self.format);
        self.generate(&prompt, "card", &card.id).await
    }

    async fn summarize_commit(&self, commit: &Commit) -> Result<String, SummarizeError> {
        let prompt = commit_prompt(truncate_diff(commit.diff.as_text()));
        let id = format!("{}@{}", commit.repo, commit.sha);
        self.generate(&prompt, "commit", &id).await
    }

    async fn generate(
        &self,
        prompt: &str,
        level: &'static str,
        id: &str,
    ) -> Result<String, SummarizeError> {
        // Never closed, so acquisition only waits.
        let _permit = self.permits.acquire().await.ok();
        self.generator
            .complete(prompt)
            .await
            .map_err(|source| SummarizeError::Generate {
                level,
                id: id.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::fakes::ScriptedGenerator;
    use crate::types::DiffText;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingGenerator {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String, RemoteError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    fn commit(repo: &str, sha: &str, diff: &str) -> Commit {
        Commit {
            repo: repo.to_string(),
            sha: sha.to_string(),
            diff: DiffText::Fetched(diff.to_string()),
        }
    }

    fn card(id: &str, commits: Vec<Commit>) -> Card {
        Card {
            id: id.to_string(),
            title: format!("{id} title"),
            description: String::new(),
            commits,
        }
    }

    fn epic(cards: Vec<Card>) -> Epic {
        Epic {
            id: "EPIC-1".to_string(),
            title: "Payments".to_string(),
            description: "Rework payments".to_string(),
            cards,
        }
    }

    #[test]
    fn truncation_boundary_is_exact() {
        let exact = "x".repeat(MAX_DIFF_CHARS);
        assert_eq!(truncate_diff(&exact), exact);
        let long = "y".repeat(MAX_DIFF_CHARS + 1);
        assert_eq!(truncate_diff(&long).chars().count(), MAX_DIFF_CHARS);
        let wide = "é".repeat(MAX_DIFF_CHARS + 5);
        assert_eq!(truncate_diff(&wide).chars().count(), MAX_DIFF_CHARS);
    }

    #[tokio::test]
    async fn long_diff_is_truncated_before_prompting() {
        let generator = ScriptedGenerator::new();
        let long = format!("{}TAIL", "a".repeat(MAX_DIFF_CHARS));
        let epic = epic(vec![card("CARD-1", vec![commit("svc", "abc1234", &long)])]);

        HierarchicalSummarizer::new(&generator, SummaryFormat::Markdown)
            .summarize_epic(&epic)
            .await
            .unwrap();

        let prompts = generator.prompts();
        assert!(prompts[0].contains(&"a".repeat(MAX_DIFF_CHARS)));
        assert!(!prompts[0].contains("TAIL"));
    }

    #[tokio::test]
    async fn folds_preserve_card_and_commit_order() {
        let generator = ScriptedGenerator::new();
        let epic = epic(vec![
            card(
                "CARD-1",
                vec![commit("svc-a", "aaaaaaa", "+1"), commit("svc-b", "bbbbbbb", "+2")],
            ),
            card("CARD-2", vec![commit("svc-c", "ccccccc", "+3")]),
        ]);

        let summary = HierarchicalSummarizer::new(&generator, SummaryFormat::Markdown)
            .summarize_epic(&epic)
            .await
            .unwrap();

        // commit, commit, card, commit, card, epic
        assert_eq!(summary, "summary #6");
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 6);
        assert!(prompts[2].contains(
            "- Repo: svc-a, SHA: aaaaaaa\nsummary #1\n\n- Repo: svc-b, SHA: bbbbbbb\nsummary #2"
        ));
        let epic_prompt = &prompts[5];
        let first = epic_prompt.find("### CARD-1 - CARD-1 title\nsummary #3").unwrap();
        let second = epic_prompt.find("### CARD-2 - CARD-2 title\nsummary #5").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn parallel_summaries_fold_in_original_order() {
        let generator = ScriptedGenerator::new();
        let cards = (1..=5)
            .map(|i| card(&format!("CARD-{i}"), vec![commit("svc", &format!("sha{i}"), "+x")]))
            .collect();

        HierarchicalSummarizer::new(&generator, SummaryFormat::Table)
            .with_concurrency(4)
            .summarize_epic(&epic(cards))
            .await
            .unwrap();

        let last = generator.last_prompt().unwrap();
        let positions: Vec<usize> = (1..=5)
            .map(|i| last.find(&format!("### CARD-{i} -")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn concurrency_bounds_calls_across_levels() {
        let generator = CountingGenerator::default();
        let cards = (1..=4)
            .map(|i| {
                let commits = (1..=4)
                    .map(|j| commit("svc", &format!("sha{i}{j}"), "+x"))
                    .collect();
                card(&format!("CARD-{i}"), commits)
            })
            .collect();

        HierarchicalSummarizer::new(&generator, SummaryFormat::Markdown)
            .with_concurrency(2)
            .summarize_epic(&epic(cards))
            .await
            .unwrap();

        let peak = generator.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "{peak} generator calls ran at once");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn summarizing_runs_on_a_spawned_task() {
        let generator = Arc::new(ScriptedGenerator::new());
        let epic = epic(vec![
            card("CARD-1", vec![commit("svc", "aaaaaaa", "+1")]),
            card("CARD-2", vec![commit("svc", "bbbbbbb", "+2")]),
        ]);

        let worker = generator.clone();
        let summary = tokio::spawn(async move {
            HierarchicalSummarizer::new(&*worker, SummaryFormat::Markdown)
                .with_concurrency(2)
                .summarize_epic(&epic)
                .await
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary, "summary #5");
        assert_eq!(generator.prompts().len(), 5);
    }

    #[tokio::test]
    async fn empty_epic_still_produces_a_summary() {
        let generator = ScriptedGenerator::new();
        let summary = HierarchicalSummarizer::new(&generator, SummaryFormat::Markdown)
            .summarize_epic(&epic(Vec::new()))
            .await
            .unwrap();
        assert_eq!(summary, "summary #1");
        assert!(generator.prompts()[0].contains("Epic title: Payments"));
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let generator = ScriptedGenerator::failing_on("Card title: CARD-2 title");
        let epic = epic(vec![card("CARD-1", Vec::new()), card("CARD-2", Vec::new())]);

        let err = HierarchicalSummarizer::new(&generator, SummaryFormat::Markdown)
            .summarize_epic(&epic)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "failed to summarize card CARD-2");
        assert!(generator.prompts().iter().all(|p| !p.contains("Epic title")));
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("XHTML".parse::<SummaryFormat>().unwrap(), SummaryFormat::Xhtml);
        assert_eq!("table".parse::<SummaryFormat>().unwrap(), SummaryFormat::Table);
        assert!("pdf".parse::<SummaryFormat>().is_err());
        assert_eq!(SummaryFormat::default().to_string(), "markdown");
    }
}
