//! Export orchestration
//!
//! [`Exporter`] pulls documents from a [`crate::source::DocumentSource`],
//! routes and flattens them, keeps table definitions in step, and upserts the
//! resulting rows into a [`crate::store::RelationalStore`].

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{ExportStats, Exporter, SkipReason};
pub use progress::{ProgressReport, ProgressTracker};
