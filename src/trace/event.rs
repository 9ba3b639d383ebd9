//! Protocol event log.
//!
//! Raw instrumentation events are appended in arrival order while a page
//! loads and read back once the job is finished. Events from different
//! families carry no causal ordering relative to each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw protocol event: its family name and an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    pub method: String,
    pub params: Value,
}

impl ProtocolEvent {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The `requestId` carried by network events, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.params.get("requestId").and_then(Value::as_str)
    }

    pub fn is(&self, method: &str) -> bool {
        self.method == method
    }
}

/// Append-only, arrival-ordered store of protocol events for one job.
///
/// The log is owned by a single job runner. Browser listeners never touch it
/// directly: they feed a bounded channel and the runner appends, so appends are
/// serialized by construction and the correlator only reads the log after the
/// runner stopped draining that channel.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[ProtocolEvent] {
        &self.events
    }
}

impl FromIterator<ProtocolEvent> for EventLog {
    fn from_iter<I: IntoIterator<Item = ProtocolEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_extraction() {
        let event = ProtocolEvent::new(
            "Network.loadingFinished",
            json!({"requestId": "42.1", "timestamp": 1.5}),
        );
        assert_eq!(event.request_id(), Some("42.1"));

        let page_event = ProtocolEvent::new("Page.loadEventFired", json!({"timestamp": 2.0}));
        assert_eq!(page_event.request_id(), None);
    }

    #[test]
    fn test_event_log_preserves_arrival_order() {
        let mut log = EventLog::new();
        assert!(log.is_empty());
        log.append(ProtocolEvent::new("b", json!({})));
        log.append(ProtocolEvent::new("a", json!({})));
        log.append(ProtocolEvent::new("c", json!({})));

        let methods: Vec<&str> = log.iter().map(|e| e.method.as_str()).collect();
        assert_eq!(methods, vec!["b", "a", "c"]);
        assert_eq!(log.len(), 3);
    }
}
