//! Per-job summary record.

use serde::{Deserialize, Serialize};

use crate::trace::{CapturedRequest, CookieRecord};

use super::config::JobConfig;

/// Aggregate of one job, built once at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub schedule_id: Option<String>,
    pub schedule_history_id: Option<String>,
    pub company_id: Option<serde_json::Value>,
    /// Creation time in milliseconds since the epoch
    pub at: i64,
    pub url: String,
    pub url_hash: String,
    pub request_count: usize,
    /// `loadEventEnd - navigationStart` in milliseconds, -1 when unknown
    pub load_time: f64,
    /// Browser cookie jar at the end of the job
    pub cookies: Vec<CookieRecord>,
    /// Distinct hostnames contacted, in first-seen order
    pub domains: Vec<String>,
}

impl JobSummary {
    pub fn new(
        job: &JobConfig,
        requests: &[CapturedRequest],
        load_time: f64,
        cookies: Vec<CookieRecord>,
        domains: Vec<String>,
    ) -> Self {
        JobSummary {
            job_id: job.work_id.clone(),
            schedule_id: job.schedule_id(),
            schedule_history_id: job.schedule_history_id(),
            company_id: job.company_id(),
            at: chrono::Utc::now().timestamp_millis(),
            url: job.url.clone(),
            url_hash: job.url_hash(),
            request_count: requests.len(),
            load_time,
            cookies,
            domains,
        }
    }
}
