//! Job model: the decoded job, its summary and its terminal outcome.

mod config;
mod outcome;
mod summary;

pub use config::{scalar_to_string, Company, JobConfig, JobSettings, ScheduleHistory};
pub use outcome::JobOutcome;
pub use summary::JobSummary;
