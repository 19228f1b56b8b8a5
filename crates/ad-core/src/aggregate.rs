use crate::archive::DiffArchive;
use crate::error::ArchiveError;
use crate::types::{Card, Epic, EpicMetadata};
use tracing::{debug, warn};

/// Assembles the epic hierarchy from tracker metadata and archived scans.
///
/// Cards keep the metadata order. A card whose archive is missing or
/// unreadable is kept with no commits.
pub fn build_epic(metadata: &EpicMetadata, archive: &dyn DiffArchive) -> Epic {
    let cards = metadata
        .cards
        .iter()
        .map(|card| {
            let commits = match archive.load(&card.id) {
                Ok(archived) => {
                    debug!(card_id = %card.id, commits = archived.commit_count(), "loaded archive");
                    archived.into_commits()
                }
                Err(ArchiveError::NotFound { .. }) => {
                    warn!(card_id = %card.id, "no archived scan for card; using no commits");
                    Vec::new()
                }
                Err(err) => {
                    warn!(card_id = %card.id, error = %err, "unreadable archive for card; using no commits");
                    Vec::new()
                }
            };
            Card {
                id: card.id.clone(),
                title: card.title.clone(),
                description: card.description.clone(),
                commits,
            }
        })
        .collect();

    Epic {
        id: metadata.id.clone(),
        title: metadata.title.clone(),
        description: metadata.description.clone(),
        cards,
    }
}
