pub mod epic;
pub mod ids;
pub mod job;
pub mod scan;

pub use epic::{Card, CardMetadata, Commit, Epic, EpicMetadata};
pub use ids::{IdError, JobId};
pub use job::{Job, JobStatus, LogLine};
pub use scan::{ArchivedScan, DiffText, RepoGroup, ScanResult};
