use crate::types::scan::DiffText;
use serde::{Deserialize, Serialize};

/// Epic fields as reported by the issue tracker, plus the linked cards that
/// could be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub cards: Vec<CardMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub description: String,
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub repo: String,
    pub sha: String,
    pub diff: DiffText,
}

impl Epic {
    pub fn commit_count(&self) -> usize {
        self.cards.iter().map(|card| card.commits.len()).sum()
    }
}
