//! Bulk job processing: submission, background execution, progress and export.

pub mod models;
pub mod runner;
pub mod store;

pub use models::{
    InputRow, Job, JobKind, JobProgress, JobReceipt, JobStatus, ResultFilter, ResultRow,
};
pub use runner::JobRunner;
pub use store::{InMemoryJobStore, JobStore};
