//! Trace correlation.
//!
//! Reconciles the protocol event log with the captured requests of a job.
//! Matching is by request identifier and event family only, never by
//! position, so the result does not depend on the order events arrived in.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{
    EVENT_RESPONSE_RECEIVED, EVENT_RESPONSE_RECEIVED_EXTRA_INFO, EXTRAS_NETWORK_TIMING,
    EXTRAS_RESPONSE_EXTRA_INFO,
};

use super::cookie::CookieRecord;
use super::event::ProtocolEvent;
use super::request::CapturedRequest;
use super::timing::TimingBreakdown;

/// First event of each correlated family, keyed by request identifier.
struct EventIndex<'a> {
    responses: HashMap<&'a str, &'a ProtocolEvent>,
    extra_info: HashMap<&'a str, &'a ProtocolEvent>,
}

impl<'a> EventIndex<'a> {
    fn build(events: &'a [ProtocolEvent]) -> Self {
        let mut responses = HashMap::new();
        let mut extra_info = HashMap::new();

        for event in events {
            let table = if event.is(EVENT_RESPONSE_RECEIVED) {
                &mut responses
            } else if event.is(EVENT_RESPONSE_RECEIVED_EXTRA_INFO) {
                &mut extra_info
            } else {
                continue;
            };
            let Some(request_id) = event.request_id() else {
                continue;
            };
            if table.contains_key(request_id) {
                log::debug!(
                    "Duplicate {} event for request {}, keeping the first one",
                    event.method,
                    request_id
                );
                continue;
            }
            table.insert(request_id, event);
        }

        EventIndex {
            responses,
            extra_info,
        }
    }
}

/// Finds the `Set-Cookie` entry of a header map, whatever its casing.
fn set_cookie_header(params: &Value) -> Option<&str> {
    params
        .get("headers")?
        .as_object()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .and_then(|(_, value)| value.as_str())
}

fn finalize_request(mut request: CapturedRequest, index: &EventIndex<'_>) -> CapturedRequest {
    if let Some(event) = index.responses.get(request.request_id.as_str()) {
        if let Some(raw_timing) = event.params.get("response").and_then(|r| r.get("timing")) {
            request.timing = TimingBreakdown::from_payload(raw_timing);
            if request.timing.is_none() {
                log::debug!(
                    "Unreadable timing payload for request {}",
                    request.request_id
                );
            }
            request
                .extras
                .insert(EXTRAS_NETWORK_TIMING.to_string(), raw_timing.clone());
        }
    }

    if let Some(event) = index.extra_info.get(request.request_id.as_str()) {
        let mut params = event.params.clone();
        // The raw header text repeats the header map.
        if let Some(object) = params.as_object_mut() {
            object.remove("headersText");
        }
        if let Some(header) = set_cookie_header(&params) {
            request.cookies = CookieRecord::parse_header(header);
        }
        request
            .extras
            .insert(EXTRAS_RESPONSE_EXTRA_INFO.to_string(), params);
    }

    request
}

/// Attaches timing breakdowns, raw timing payloads and cookies to every
/// captured request.
///
/// Requests without matching events pass through unchanged. When an event
/// family has several events for one identifier, the first in the log wins.
///
/// # Arguments
///
/// * `events` - The job's protocol event log, in arrival order
/// * `requests` - The requests captured during the job
///
/// # Returns
///
/// The finalized requests, in the same order as `requests`.
pub fn correlate(events: &[ProtocolEvent], requests: Vec<CapturedRequest>) -> Vec<CapturedRequest> {
    let index = EventIndex::build(events);
    requests
        .into_iter()
        .map(|request| finalize_request(request, &index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::timing::NOT_MEASURED;
    use serde_json::json;

    fn response_received(request_id: &str, send_start: f64) -> ProtocolEvent {
        ProtocolEvent::new(
            EVENT_RESPONSE_RECEIVED,
            json!({
                "requestId": request_id,
                "type": "Script",
                "response": {
                    "url": format!("https://example.com/{request_id}.js"),
                    "status": 200,
                    "timing": {
                        "requestTime": 100.0,
                        "dnsStart": -1, "dnsEnd": -1,
                        "connectStart": -1, "connectEnd": -1,
                        "sslStart": -1, "sslEnd": -1,
                        "sendStart": send_start, "sendEnd": send_start + 0.5,
                        "receiveHeadersEnd": send_start + 30.0
                    }
                }
            }),
        )
    }

    fn extra_info(request_id: &str, set_cookie: Option<&str>) -> ProtocolEvent {
        let mut headers = serde_json::Map::new();
        headers.insert("content-type".into(), json!("text/html"));
        if let Some(value) = set_cookie {
            headers.insert("Set-Cookie".into(), json!(value));
        }
        ProtocolEvent::new(
            EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
            json!({
                "requestId": request_id,
                "headers": headers,
                "headersText": "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\n\r\n",
                "statusCode": 200
            }),
        )
    }

    fn requests(ids: &[&str]) -> Vec<CapturedRequest> {
        ids.iter()
            .map(|id| CapturedRequest::new(*id, format!("https://example.com/{id}.js")))
            .collect()
    }

    #[test]
    fn test_timing_and_raw_payload_attached() {
        let events = vec![response_received("1", 2.0)];
        let out = correlate(&events, requests(&["1"]));

        let timing = out[0].timing.expect("timing computed");
        assert_eq!(timing.blocked, 2.0);
        assert_eq!(timing.dns, NOT_MEASURED);
        assert_eq!(timing.send, 0.5);
        assert_eq!(timing.wait, 29.5);
        assert_eq!(
            out[0].extras[EXTRAS_NETWORK_TIMING]["requestTime"],
            json!(100.0)
        );
    }

    #[test]
    fn test_unmatched_request_passes_through() {
        let events = vec![response_received("other", 1.0)];
        let input = requests(&["lonely"]);
        let out = correlate(&events, input.clone());
        assert_eq!(out, input);
        assert!(out[0].timing.is_none());
        assert!(out[0].cookies.is_empty());
    }

    #[test]
    fn test_multi_line_set_cookie_yields_one_record_per_line() {
        let events = vec![extra_info(
            "7",
            Some("a=1; Path=/\nb=2; HttpOnly\nc=3; Secure; SameSite=None"),
        )];
        let out = correlate(&events, requests(&["7"]));
        assert_eq!(out[0].cookies.len(), 3);
        assert_eq!(out[0].cookies[1].name.as_deref(), Some("b"));
        assert_eq!(out[0].cookies[2].samesite.as_deref(), Some("None"));
    }

    #[test]
    fn test_extra_info_drops_header_text() {
        let events = vec![extra_info("7", None)];
        let out = correlate(&events, requests(&["7"]));
        let attached = &out[0].extras[EXTRAS_RESPONSE_EXTRA_INFO];
        assert!(attached.get("headersText").is_none());
        assert_eq!(attached["statusCode"], json!(200));
        assert!(out[0].cookies.is_empty());
    }

    #[test]
    fn test_lowercase_set_cookie_header_is_found() {
        let event = ProtocolEvent::new(
            EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
            json!({"requestId": "h2", "headers": {"set-cookie": "x=1\ny=2"}}),
        );
        let out = correlate(&[event], requests(&["h2"]));
        assert_eq!(out[0].cookies.len(), 2);
    }

    #[test]
    fn test_duplicate_events_keep_first_and_do_not_fail() {
        let events = vec![response_received("1", 1.0), response_received("1", 9.0)];
        let out = correlate(&events, requests(&["1"]));
        assert_eq!(out[0].timing.unwrap().blocked, 1.0);
    }

    #[test]
    fn test_response_without_timing_leaves_timing_empty() {
        let event = ProtocolEvent::new(
            EVENT_RESPONSE_RECEIVED,
            json!({"requestId": "d", "response": {"url": "data:text/plain,x", "status": 200}}),
        );
        let out = correlate(&[event], requests(&["d"]));
        assert!(out[0].timing.is_none());
        assert!(!out[0].extras.contains_key(EXTRAS_NETWORK_TIMING));
    }

    #[test]
    fn test_output_is_invariant_under_event_permutation() {
        let events = vec![
            ProtocolEvent::new("Network.requestWillBeSent", json!({"requestId": "1"})),
            response_received("1", 1.0),
            extra_info("1", Some("a=1")),
            response_received("2", 3.0),
            ProtocolEvent::new("Page.loadEventFired", json!({"timestamp": 5.0})),
            extra_info("2", Some("b=2\nc=3")),
            response_received("3", 4.5),
        ];
        let input = requests(&["1", "2", "3", "4"]);
        let expected = correlate(&events, input.clone());

        let mut reversed = events.clone();
        reversed.reverse();
        assert_eq!(correlate(&reversed, input.clone()), expected);

        for shift in 1..events.len() {
            let mut rotated = events.clone();
            rotated.rotate_left(shift);
            assert_eq!(correlate(&rotated, input.clone()), expected);
        }

        let mut interleaved: Vec<ProtocolEvent> = events.iter().step_by(2).cloned().collect();
        interleaved.extend(events.iter().skip(1).step_by(2).cloned());
        assert_eq!(correlate(&interleaved, input), expected);
    }

    use proptest::prelude::*;

    prop_compose! {
        /// Events for up to eight requests, each (family, request id) at most once.
        fn event_set()(
            phases in proptest::collection::vec(
                (proptest::option::of(0.0..50.0f64), proptest::option::of(0usize..4)),
                1..8,
            )
        ) -> Vec<ProtocolEvent> {
            let mut events = vec![ProtocolEvent::new(
                "Page.loadEventFired",
                json!({"timestamp": 5.0}),
            )];
            for (i, (send_start, cookie_count)) in phases.into_iter().enumerate() {
                let id = i.to_string();
                if let Some(send_start) = send_start {
                    events.push(response_received(&id, send_start));
                }
                if let Some(count) = cookie_count {
                    let lines: Vec<String> = (0..count).map(|c| format!("k{c}={i}")).collect();
                    let header = (count > 0).then(|| lines.join("\n"));
                    events.push(extra_info(&id, header.as_deref()));
                }
            }
            events
        }
    }

    proptest! {
        #[test]
        fn test_output_is_invariant_under_any_event_order(
            (events, shuffled) in event_set().prop_flat_map(|events| {
                let shuffled = Just(events.clone()).prop_shuffle();
                (Just(events), shuffled)
            })
        ) {
            let ids: Vec<String> = (0..9).map(|i| i.to_string()).collect();
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let input = requests(&ids);
            prop_assert_eq!(correlate(&shuffled, input.clone()), correlate(&events, input));
        }
    }
}
