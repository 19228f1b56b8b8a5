use crate::types::epic::Commit;
use serde::{Deserialize, Serialize};

/// Diff body of a matched commit. A failed fetch keeps the commit in the
/// results but is tagged so it cannot be mistaken for real diff content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "camelCase")]
pub enum DiffText {
    Fetched(String),
    Failed(String),
}

impl DiffText {
    /// Text handed to the commit summary prompt.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Fetched(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub repo: String,
    pub sha: String,
    pub message: String,
    pub date: String,
    pub diff: DiffText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoGroup {
    pub repo: String,
    pub commits: Vec<ScanResult>,
}

/// Scan results for one card, grouped by repository in ascending name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedScan {
    pub card_id: String,
    pub groups: Vec<RepoGroup>,
}

impl ArchivedScan {
    /// Stable sort by repository, then split into contiguous runs.
    pub fn group(card_id: &str, mut results: Vec<ScanResult>) -> Self {
        results.sort_by(|a, b| a.repo.cmp(&b.repo));
        let mut groups: Vec<RepoGroup> = Vec::new();
        for result in results {
            match groups.last_mut() {
                Some(group) if group.repo == result.repo => group.commits.push(result),
                _ => groups.push(RepoGroup {
                    repo: result.repo.clone(),
                    commits: vec![result],
                }),
            }
        }
        Self {
            card_id: card_id.to_string(),
            groups,
        }
    }

    pub fn commit_count(&self) -> usize {
        self.groups.iter().map(|group| group.commits.len()).sum()
    }

    /// Flattens back to commits: groups in stored order, then original order
    /// within each group.
    pub fn into_commits(self) -> Vec<Commit> {
        self.groups
            .into_iter()
            .flat_map(|group| group.commits)
            .map(|result| Commit {
                repo: result.repo,
                sha: result.sha,
                diff: result.diff,
            })
            .collect()
    }
}
