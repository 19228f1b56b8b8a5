use crate::error::ArchiveError;
use crate::types::{ArchivedScan, ScanResult};

/// Durable, card-keyed store of scan results grouped by repository.
///
/// `save` replaces any previous archive for the card wholesale.
pub trait DiffArchive: Send + Sync {
    fn save(&self, card_id: &str, results: Vec<ScanResult>) -> Result<ArchivedScan, ArchiveError>;
    fn load(&self, card_id: &str) -> Result<ArchivedScan, ArchiveError>;
}
