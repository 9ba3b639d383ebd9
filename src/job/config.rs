//! Job configuration decoded from a broker message body.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app::validate_and_normalize_url;
use crate::config::{DEFAULT_JOB_NAME, DEFAULT_USER_AGENT};
use crate::error_handling::JobConfigError;
use crate::trace::url_hash;

fn new_work_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Browser settings carried by a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Per-job navigation deadline; 0 disables it.
    #[serde(default)]
    pub navigation_timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Schedule run this job belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleHistory {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub uuid: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Immutable input of one job.
///
/// Unknown fields are kept in `extra` so the message can be logged as it was
/// received. Correlation identifiers (`external_id`, the schedule history
/// uuid and the company id) are passed through untouched to the job summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job identifier, generated when the message does not carry one
    #[serde(default = "new_work_id")]
    pub work_id: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    pub url: String,
    #[serde(default)]
    pub url_hash: Option<Value>,
    #[serde(default)]
    pub enabled: Option<Value>,
    #[serde(default)]
    pub external_id: Option<Value>,
    #[serde(default)]
    pub config: JobSettings,
    #[serde(default)]
    pub queue_schedule_history: Option<ScheduleHistory>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Renders a scalar identifier as text; objects and arrays are not identifiers.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl JobConfig {
    /// The built-in job used when a message arrives without a body.
    pub fn default_job(url: &str) -> Self {
        JobConfig {
            work_id: new_work_id(),
            id: Some(Value::from(1)),
            name: Some(Value::from(DEFAULT_JOB_NAME)),
            url: url.to_string(),
            url_hash: Some(Value::from(url_hash(url))),
            enabled: Some(Value::Bool(true)),
            external_id: Some(Value::from("external_id")),
            config: JobSettings {
                user_agent: Some(DEFAULT_USER_AGENT.to_string()),
                ..JobSettings::default()
            },
            queue_schedule_history: Some(ScheduleHistory {
                id: Some(Value::from(1)),
                uuid: Some(Value::from(new_work_id())),
                extra: Map::new(),
            }),
            company: Some(Company {
                id: Some(Value::from(1)),
                name: Some(Value::from("Company 1")),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    /// Decodes a message body into a validated job.
    ///
    /// An empty body yields the default job for `default_url`. The job URL is
    /// normalized and must use http or https.
    ///
    /// # Errors
    ///
    /// Returns `JobConfigError` when the body is not UTF-8, not a job
    /// document, or names a URL that cannot be analysed.
    pub fn decode(body: &[u8], default_url: &str) -> Result<Self, JobConfigError> {
        let text = std::str::from_utf8(body)?;
        let mut job = if text.trim().is_empty() {
            log::debug!("Empty message body, using the default job");
            Self::default_job(default_url)
        } else {
            serde_json::from_str::<JobConfig>(text)?
        };
        job.url = validate_and_normalize_url(&job.url)?;
        Ok(job)
    }

    /// Navigation deadline for this job, falling back to the worker setting.
    pub fn navigation_timeout(&self, fallback: Option<Duration>) -> Option<Duration> {
        match self.config.navigation_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => fallback,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.config
            .user_agent
            .as_deref()
            .filter(|ua| !ua.trim().is_empty())
    }

    pub fn schedule_id(&self) -> Option<String> {
        self.external_id.as_ref().and_then(scalar_to_string)
    }

    pub fn schedule_history_id(&self) -> Option<String> {
        self.queue_schedule_history
            .as_ref()
            .and_then(|history| history.uuid.as_ref())
            .and_then(scalar_to_string)
    }

    /// Company identifier exactly as the message carried it.
    pub fn company_id(&self) -> Option<Value> {
        self.company.as_ref().and_then(|company| company.id.clone())
    }

    /// Hash of the job URL: the one supplied by the caller, else computed.
    pub fn url_hash(&self) -> String {
        self.url_hash
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_else(|| url_hash(&self.url))
    }
}
