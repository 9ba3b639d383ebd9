//! Request capture.
//!
//! Builds the per-job list of `CapturedRequest`s from the live protocol event
//! stream. The runner feeds every event it appends to the event log through
//! `RequestCapture::ingest`; timing and cookies are attached later by the
//! correlator.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::config::{
    EVENT_FRAME_DETACHED, EVENT_REQUEST_SERVED_FROM_CACHE, EVENT_REQUEST_WILL_BE_SENT,
    EVENT_RESPONSE_RECEIVED,
};

use super::event::ProtocolEvent;
use super::request::{CapturedRequest, RemoteAddress};

const SKIPPED_URL_PREFIX: &str = "data:image";
const NAVIGATION_RESOURCE_TYPE: &str = "Document";

/// Request side of an exchange, remembered until its response shows up.
#[derive(Debug, Default)]
struct OutgoingRequest {
    method: Option<String>,
    headers: Map<String, Value>,
    post_data: Option<String>,
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn object_field(value: &Value, key: &str) -> Map<String, Value> {
    value
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Accumulates captured requests and contacted hostnames for one job.
#[derive(Debug, Default)]
pub struct RequestCapture {
    job_id: Option<String>,
    company_id: Option<Value>,
    outgoing: HashMap<String, OutgoingRequest>,
    served_from_cache: HashSet<String>,
    detached_frames: HashSet<String>,
    requests: Vec<CapturedRequest>,
    positions: HashMap<String, usize>,
    domains: Vec<String>,
}

impl RequestCapture {
    /// Creates an empty capture whose records are tagged with the given ids.
    pub fn new(job_id: impl Into<String>, company_id: Option<Value>) -> Self {
        RequestCapture {
            job_id: Some(job_id.into()),
            company_id,
            ..Self::default()
        }
    }

    /// Feeds one protocol event. Events of other families are ignored.
    pub fn ingest(&mut self, event: &ProtocolEvent) {
        if event.is(EVENT_FRAME_DETACHED) {
            if let Some(frame_id) = str_field(&event.params, "frameId") {
                self.detached_frames.insert(frame_id);
            }
            return;
        }
        let Some(request_id) = event.request_id() else {
            return;
        };

        if event.is(EVENT_REQUEST_WILL_BE_SENT) {
            self.record_outgoing(request_id, &event.params);
        } else if event.is(EVENT_REQUEST_SERVED_FROM_CACHE) {
            match self.positions.get(request_id) {
                Some(&position) => self.requests[position].from_cache = true,
                None => {
                    self.served_from_cache.insert(request_id.to_string());
                }
            }
        } else if event.is(EVENT_RESPONSE_RECEIVED) {
            self.record_response(request_id, &event.params);
        }
    }

    fn record_outgoing(&mut self, request_id: &str, params: &Value) {
        let request = params.get("request").cloned().unwrap_or(Value::Null);
        // Redirects reuse the request id; the latest hop wins.
        self.outgoing.insert(
            request_id.to_string(),
            OutgoingRequest {
                method: str_field(&request, "method"),
                headers: object_field(&request, "headers"),
                post_data: str_field(&request, "postData"),
            },
        );
    }

    fn record_response(&mut self, request_id: &str, params: &Value) {
        if self.positions.contains_key(request_id) {
            log::debug!("Ignoring repeated response for request {request_id}");
            return;
        }

        let response = params.get("response").cloned().unwrap_or(Value::Null);
        let Some(url) = str_field(&response, "url") else {
            log::debug!("Response for request {request_id} carries no URL");
            return;
        };
        if url.starts_with(SKIPPED_URL_PREFIX) {
            return;
        }

        let mut request = CapturedRequest::new(request_id, url);
        request.job_id = self.job_id.clone();
        request.company_id = self.company_id.clone();

        request.status = response.get("status").and_then(Value::as_i64).unwrap_or(0);
        request.status_text = str_field(&response, "statusText").unwrap_or_default();
        request.ok = (200..=299).contains(&request.status);
        request.headers = object_field(&response, "headers");
        request.remote_address = RemoteAddress {
            ip: str_field(&response, "remoteIPAddress"),
            port: response.get("remotePort").and_then(Value::as_i64),
        };
        request.from_cache = bool_field(&response, "fromDiskCache")
            || bool_field(&response, "fromServiceWorker")
            || bool_field(&response, "fromPrefetchCache")
            || self.served_from_cache.remove(request_id);

        request.resource_type = str_field(params, "type");
        request.frame_id = str_field(params, "frameId");
        request.is_detached = request
            .frame_id
            .as_ref()
            .is_some_and(|frame_id| self.detached_frames.contains(frame_id));
        request.is_navigation_request = params.get("loaderId").and_then(Value::as_str)
            == Some(request_id)
            && request.resource_type.as_deref() == Some(NAVIGATION_RESOURCE_TYPE);

        if let Some(outgoing) = self.outgoing.remove(request_id) {
            if let Some(method) = outgoing.method {
                request.method = method;
            }
            request.request_headers = outgoing.headers;
            request.post_data = outgoing.post_data;
        }
        if let Some(sent_headers) = response.get("requestHeaders").and_then(Value::as_object) {
            request.request_headers = sent_headers.clone();
        }

        if let Some(hostname) = &request.hostname {
            if !self.domains.contains(hostname) {
                self.domains.push(hostname.clone());
            }
        }

        self.positions
            .insert(request_id.to_string(), self.requests.len());
        self.requests.push(request);
    }

    /// Whether a response was captured for this request id.
    pub fn contains(&self, request_id: &str) -> bool {
        self.positions.contains_key(request_id)
    }

    /// Stores a fetched body snapshot on its request.
    pub fn record_body(&mut self, request_id: &str, body: String) {
        if let Some(&position) = self.positions.get(request_id) {
            self.requests[position].content = Some(body);
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Distinct hostnames of captured URLs, in first-seen order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Consumes the capture, returning the requests and contacted hostnames.
    pub fn into_parts(self) -> (Vec<CapturedRequest>, Vec<String>) {
        (self.requests, self.domains)
    }
}
