//! In-memory collaborators for tests and offline runs.
//!
//! `MemoryArchive`, `FakeTracker`, `FakeSourceHost`, `ScriptedGenerator` and
//! `FakePublisher` satisfy the collaborator traits without any network or
//! disk access.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::archive::DiffArchive;
use crate::error::{ArchiveError, RemoteError};
use crate::generator::TextGenerator;
use crate::publisher::Publisher;
use crate::source::{CommitSummary, RepoSummary, SourceHost};
use crate::tracker::IssueTracker;
use crate::types::{ArchivedScan, CardMetadata, EpicMetadata, ScanResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn server_error(body: &str) -> RemoteError {
    RemoteError::Status {
        status: 500,
        body: body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MemoryArchive
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryArchive {
    archives: Mutex<HashMap<String, ArchivedScan>>,
    corrupt: Mutex<HashSet<String>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `load` for this card fail with a decode error.
    pub fn corrupt(&self, card_id: &str) {
        lock(&self.corrupt).insert(card_id.to_string());
    }

    pub fn contains(&self, card_id: &str) -> bool {
        lock(&self.archives).contains_key(card_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.archives).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiffArchive for MemoryArchive {
    fn save(&self, card_id: &str, results: Vec<ScanResult>) -> Result<ArchivedScan, ArchiveError> {
        let archived = ArchivedScan::group(card_id, results);
        lock(&self.archives).insert(card_id.to_string(), archived.clone());
        Ok(archived)
    }

    fn load(&self, card_id: &str) -> Result<ArchivedScan, ArchiveError> {
        if lock(&self.corrupt).contains(card_id) {
            return Err(ArchiveError::Decode {
                message: format!("corrupt archive for {card_id}"),
            });
        }
        lock(&self.archives)
            .get(card_id)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound {
                card_id: card_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// FakeTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeTracker {
    epics: HashMap<String, EpicMetadata>,
    links: HashMap<String, Vec<String>>,
    cards: HashMap<String, CardMetadata>,
    failing_links: HashSet<String>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epic(mut self, key: &str, title: &str, description: &str) -> Self {
        self.epics.insert(
            key.to_string(),
            EpicMetadata {
                id: key.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                status: "In Progress".to_string(),
                cards: Vec::new(),
            },
        );
        self.links.entry(key.to_string()).or_default();
        self
    }

    /// Links a card to the epic. Cards linked without metadata are reported
    /// by `linked_issue_keys` but fail `get_card`.
    pub fn with_card(mut self, epic_key: &str, card_key: &str, title: &str) -> Self {
        self.links
            .entry(epic_key.to_string())
            .or_default()
            .push(card_key.to_string());
        self.cards.insert(
            card_key.to_string(),
            CardMetadata {
                id: card_key.to_string(),
                title: title.to_string(),
                description: format!("{title} description"),
                status: "Done".to_string(),
                assignee: "Unassigned".to_string(),
            },
        );
        self
    }

    pub fn with_dangling_link(mut self, epic_key: &str, card_key: &str) -> Self {
        self.links
            .entry(epic_key.to_string())
            .or_default()
            .push(card_key.to_string());
        self
    }

    pub fn failing_links(mut self, epic_key: &str) -> Self {
        self.failing_links.insert(epic_key.to_string());
        self
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn get_epic(&self, key: &str) -> Result<EpicMetadata, RemoteError> {
        self.epics.get(key).cloned().ok_or_else(|| RemoteError::NotFound {
            what: format!("issue {key}"),
        })
    }

    async fn linked_issue_keys(&self, epic_key: &str) -> Result<Vec<String>, RemoteError> {
        if self.failing_links.contains(epic_key) {
            return Err(server_error("search failed"));
        }
        Ok(self.links.get(epic_key).cloned().unwrap_or_default())
    }

    async fn get_card(&self, key: &str) -> Result<CardMetadata, RemoteError> {
        self.cards.get(key).cloned().ok_or_else(|| RemoteError::NotFound {
            what: format!("issue {key}"),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeSourceHost
// ---------------------------------------------------------------------------

/// Serves repositories and commits as pre-built pages. Requests past the
/// last page return an empty page.
#[derive(Debug, Default)]
pub struct FakeSourceHost {
    repo_pages: Vec<Vec<String>>,
    commit_pages: HashMap<String, Vec<Vec<CommitSummary>>>,
    diffs: HashMap<String, String>,
    fail_repo_listing: bool,
    failing_commit_listings: HashSet<String>,
    failing_diffs: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeSourceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo_page(mut self, names: &[&str]) -> Self {
        self.repo_pages
            .push(names.iter().map(|name| (*name).to_string()).collect());
        self
    }

    /// Appends one page of commits for `repo`; each entry is `(sha, message)`.
    pub fn with_commit_page(mut self, repo: &str, commits: &[(&str, &str)]) -> Self {
        let page = commits
            .iter()
            .map(|(sha, message)| CommitSummary {
                sha: (*sha).to_string(),
                message: (*message).to_string(),
                date: "2024-05-01T12:00:00Z".to_string(),
            })
            .collect();
        self.commit_pages
            .entry(repo.to_string())
            .or_default()
            .push(page);
        self
    }

    pub fn with_diff(mut self, sha: &str, diff: &str) -> Self {
        self.diffs.insert(sha.to_string(), diff.to_string());
        self
    }

    pub fn failing_repo_listing(mut self) -> Self {
        self.fail_repo_listing = true;
        self
    }

    pub fn failing_commit_listing(mut self, repo: &str) -> Self {
        self.failing_commit_listings.insert(repo.to_string());
        self
    }

    pub fn failing_diff(mut self, sha: &str) -> Self {
        self.failing_diffs.insert(sha.to_string());
        self
    }

    /// Every call made so far, e.g. `repos:2`, `commits:svc-a:1`, `diff:svc-a:abc`.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl SourceHost for FakeSourceHost {
    async fn list_repos_page(
        &self,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<RepoSummary>, RemoteError> {
        lock(&self.requests).push(format!("repos:{page}"));
        if self.fail_repo_listing {
            return Err(server_error("org listing unavailable"));
        }
        let index = page.saturating_sub(1) as usize;
        Ok(self
            .repo_pages
            .get(index)
            .map(|names| {
                names
                    .iter()
                    .map(|name| RepoSummary { name: name.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_commits_page(
        &self,
        repo: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<CommitSummary>, RemoteError> {
        lock(&self.requests).push(format!("commits:{repo}:{page}"));
        if self.failing_commit_listings.contains(repo) {
            return Err(RemoteError::Status {
                status: 409,
                body: "Git Repository is empty.".to_string(),
            });
        }
        let index = page.saturating_sub(1) as usize;
        Ok(self
            .commit_pages
            .get(repo)
            .and_then(|pages| pages.get(index))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_diff(&self, repo: &str, sha: &str) -> Result<String, RemoteError> {
        lock(&self.requests).push(format!("diff:{repo}:{sha}"));
        if self.failing_diffs.contains(sha) {
            return Err(RemoteError::Status {
                status: 404,
                body: "No commit found".to_string(),
            });
        }
        Ok(self
            .diffs
            .get(sha)
            .cloned()
            .unwrap_or_else(|| format!("diff --git a/{repo} b/{repo}\n+{sha}")))
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Records every prompt and answers `summary #<n>` (1-based call order).
/// Prompts containing a configured marker fail.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
    fail_marker: Option<String>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.prompts).last().cloned()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        let mut prompts = lock(&self.prompts);
        prompts.push(prompt.to_string());
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(RemoteError::Status {
                    status: 429,
                    body: "quota exceeded".to_string(),
                });
            }
        }
        Ok(format!("summary #{}", prompts.len()))
    }
}

// ---------------------------------------------------------------------------
// FakePublisher
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakePublisher {
    url: Option<String>,
    fail_publish: bool,
    fail_annotate: bool,
    published: Mutex<Vec<(String, String)>>,
    annotations: Mutex<Vec<(String, String)>>,
}

impl FakePublisher {
    pub fn returning(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn without_url() -> Self {
        Self::default()
    }

    pub fn failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    pub fn failing_annotate(mut self) -> Self {
        self.fail_annotate = true;
        self
    }

    /// `(title, html)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        lock(&self.published).clone()
    }

    /// `(url, issue_key)` pairs in annotate order.
    pub fn annotations(&self) -> Vec<(String, String)> {
        lock(&self.annotations).clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, title: &str, html: &str) -> Result<Option<String>, RemoteError> {
        if self.fail_publish {
            return Err(server_error("space not writable"));
        }
        lock(&self.published).push((title.to_string(), html.to_string()));
        Ok(self.url.clone())
    }

    async fn annotate(&self, url: &str, issue_key: &str) -> Result<(), RemoteError> {
        if self.fail_annotate {
            return Err(server_error("comment rejected"));
        }
        lock(&self.annotations).push((url.to_string(), issue_key.to_string()));
        Ok(())
    }
}
