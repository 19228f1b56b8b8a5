pub mod aggregate;
pub mod archive;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod jobs;
pub mod pipeline;
pub mod prompts;
pub mod publisher;
pub mod render;
pub mod scan;
pub mod source;
pub mod summarize;
pub mod tracker;
pub mod validation;

pub mod types;

pub use crate::archive::DiffArchive;
pub use crate::error::{JobError, PipelineError, RemoteError};
pub use crate::generator::TextGenerator;
pub use crate::jobs::JobManager;
pub use crate::pipeline::{ChangelogPipeline, Pipeline, PipelineSettings, RunLog};
pub use crate::publisher::Publisher;
pub use crate::source::SourceHost;
pub use crate::summarize::{HierarchicalSummarizer, SummaryFormat};
pub use crate::tracker::IssueTracker;
