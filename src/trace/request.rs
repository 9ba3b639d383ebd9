//! Captured request records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use super::cookie::CookieRecord;
use super::timing::TimingBreakdown;

/// Remote endpoint a response was served from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAddress {
    pub ip: Option<String>,
    pub port: Option<i64>,
}

/// One network exchange observed during a page load.
///
/// Created when the response is first observed, finalized once by the
/// correlator (timing, cookies, extras) and never mutated after persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    /// Identifier of the job that captured this request
    pub job_id: Option<String>,
    /// Caller-supplied company identifier, passed through
    pub company_id: Option<Value>,
    /// Capture time in milliseconds since the epoch
    pub at: i64,
    /// Unique within a job
    pub request_id: String,
    pub url: String,
    /// Hex SHA-1 of `url`
    pub url_hash: String,
    pub hostname: Option<String>,
    /// Response headers
    pub headers: Map<String, Value>,
    pub request_headers: Map<String, Value>,
    pub remote_address: RemoteAddress,
    pub from_cache: bool,
    pub status: i64,
    pub status_text: String,
    pub ok: bool,
    /// Best-effort body snapshot
    pub content: Option<String>,
    pub frame_id: Option<String>,
    /// Whether the frame was already detached when the response arrived
    pub is_detached: bool,
    pub is_navigation_request: bool,
    pub method: String,
    pub post_data: Option<String>,
    pub resource_type: Option<String>,
    /// Filled by the correlator when a response-received event matches
    pub timing: Option<TimingBreakdown>,
    pub cookies: Vec<CookieRecord>,
    pub extras: Map<String, Value>,
}

impl CapturedRequest {
    /// A bare record with every optional field empty.
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        CapturedRequest {
            job_id: None,
            company_id: None,
            at: chrono::Utc::now().timestamp_millis(),
            request_id: request_id.into(),
            url_hash: url_hash(&url),
            hostname: hostname_of(&url),
            url,
            headers: Map::new(),
            request_headers: Map::new(),
            remote_address: RemoteAddress::default(),
            from_cache: false,
            status: 0,
            status_text: String::new(),
            ok: false,
            content: None,
            frame_id: None,
            is_detached: false,
            is_navigation_request: false,
            method: "GET".to_string(),
            post_data: None,
            resource_type: None,
            timing: None,
            cookies: Vec::new(),
            extras: Map::new(),
        }
    }
}

/// Hex-encoded SHA-1 of a URL, used as its content address.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Host part of a URL, `None` for URLs without one (`data:`, `about:`).
pub fn hostname_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}
