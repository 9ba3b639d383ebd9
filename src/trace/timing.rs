//! Timing breakdown derived from raw protocol phase timestamps.
//!
//! The raw payload is the `response.timing` object of a response-received
//! event: millisecond offsets relative to `requestTime`, where a negative
//! value means the phase did not happen for this request.

use serde::{Deserialize, Serialize};

/// Value reported for a phase that did not occur or cannot be measured.
pub const NOT_MEASURED: f64 = -1.0;

fn unset() -> f64 {
    NOT_MEASURED
}

/// Raw phase timestamps as reported by the browser.
///
/// Missing fields deserialize as `-1`, the protocol's own "not applicable"
/// marker, so a partial payload never fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTiming {
    #[serde(default = "unset")]
    pub dns_start: f64,
    #[serde(default = "unset")]
    pub dns_end: f64,
    #[serde(default = "unset")]
    pub connect_start: f64,
    #[serde(default = "unset")]
    pub connect_end: f64,
    #[serde(default = "unset")]
    pub ssl_start: f64,
    #[serde(default = "unset")]
    pub ssl_end: f64,
    #[serde(default = "unset")]
    pub send_start: f64,
    #[serde(default = "unset")]
    pub send_end: f64,
    #[serde(default = "unset")]
    pub receive_headers_end: f64,
}

/// Per-request timing waterfall, in milliseconds rounded to 3 fractional digits.
///
/// `-1` marks a phase that did not occur. `total` only sums the phases that did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub blocked: f64,
    pub dns: f64,
    pub connect: f64,
    pub send: f64,
    /// Time to first byte (latency)
    pub wait: f64,
    pub receive: f64,
    /// TLS handshake
    pub ssl: f64,
    pub total: f64,
}

/// Rounds a millisecond value to 3 fractional digits.
pub fn format_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Returns the first value that is `>= 0`, or `-1` when there is none.
pub fn first_non_negative(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .find(|v| *v >= 0.0)
        .unwrap_or(NOT_MEASURED)
}

/// `end - start` when the phase started, `-1` otherwise.
pub fn optional_span(start: f64, end: f64) -> f64 {
    if start >= 0.0 {
        format_millis(end - start)
    } else {
        NOT_MEASURED
    }
}

impl TimingBreakdown {
    /// Builds the breakdown from raw phase timestamps.
    pub fn from_raw(raw: &RawTiming) -> Self {
        let blocked = format_millis(first_non_negative(&[
            raw.dns_start,
            raw.connect_start,
            raw.send_start,
        ]));
        let dns = optional_span(raw.dns_start, raw.dns_end);
        let connect = optional_span(raw.connect_start, raw.connect_end);
        let send = format_millis(raw.send_end - raw.send_start);
        let wait = format_millis(raw.receive_headers_end - raw.send_end);
        // The protocol does not expose a reliable body download duration.
        let receive = 0.0;
        let ssl = optional_span(raw.ssl_start, raw.ssl_end);
        let total = format_millis(
            blocked.max(0.0) + dns.max(0.0) + connect.max(0.0) + send + wait + receive,
        );

        TimingBreakdown {
            blocked,
            dns,
            connect,
            send,
            wait,
            receive,
            ssl,
            total,
        }
    }

    /// Parses a raw `response.timing` payload and builds the breakdown.
    ///
    /// Returns `None` when the payload is not an object of numbers.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value::<RawTiming>(payload.clone())
            .ok()
            .map(|raw| Self::from_raw(&raw))
    }
}
