// Shared fakes for the runner and dispatcher scenario tests.
//
// The browser, broker and result store are replaced by in-memory doubles that
// record what the code under test did with them.

#![allow(dead_code)] // Each test file uses a different subset

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use page_trace::broker::{Acknowledge, BrokerConnector, MessageSource, QueueMessage};
use page_trace::browser::{BrowserLauncher, BrowserOptions, BrowserSession};
use page_trace::config::{
    EVENT_DATA_RECEIVED, EVENT_LOADING_FINISHED, EVENT_REQUEST_WILL_BE_SENT,
    EVENT_RESPONSE_RECEIVED, EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
};
use page_trace::error_handling::{BrokerError, BrowserError, DatabaseError};
use page_trace::storage::ResultStore;
use page_trace::trace::{CapturedRequest, CookieRecord, ProtocolEvent};
use page_trace::JobSummary;

//-----------------------------------------------------------------------------
// Protocol events
//-----------------------------------------------------------------------------

pub fn request_will_be_sent(request_id: &str, url: &str) -> ProtocolEvent {
    ProtocolEvent::new(
        EVENT_REQUEST_WILL_BE_SENT,
        json!({
            "requestId": request_id,
            "loaderId": "L0",
            "request": {"url": url, "method": "GET", "headers": {"Accept": "*/*"}}
        }),
    )
}

pub fn response_received(request_id: &str, url: &str, status: i64) -> ProtocolEvent {
    ProtocolEvent::new(
        EVENT_RESPONSE_RECEIVED,
        json!({
            "requestId": request_id,
            "loaderId": "L0",
            "frameId": "F0",
            "type": if request_id == "L0" { "Document" } else { "Script" },
            "response": {
                "url": url,
                "status": status,
                "statusText": "OK",
                "headers": {"content-type": "text/html"},
                "remoteIPAddress": "127.0.0.1",
                "remotePort": 443,
                "timing": {
                    "requestTime": 10.0,
                    "dnsStart": 0.0, "dnsEnd": 1.0,
                    "connectStart": 1.0, "connectEnd": 3.0,
                    "sslStart": 2.0, "sslEnd": 3.0,
                    "sendStart": 3.5, "sendEnd": 4.0,
                    "receiveHeadersEnd": 20.0
                }
            }
        }),
    )
}

pub fn extra_info(request_id: &str, set_cookie: &str) -> ProtocolEvent {
    ProtocolEvent::new(
        EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
        json!({
            "requestId": request_id,
            "headers": {"Set-Cookie": set_cookie},
            "headersText": "HTTP/1.1 200 OK\r\n\r\n"
        }),
    )
}

pub fn loading_finished(request_id: &str) -> ProtocolEvent {
    ProtocolEvent::new(
        EVENT_LOADING_FINISHED,
        json!({"requestId": request_id, "encodedDataLength": 512}),
    )
}

/// A complete page load: one document plus `subresources` scripts.
pub fn page_load(subresources: usize) -> Vec<ProtocolEvent> {
    let mut events = Vec::new();
    let mut push = |id: String, url: String| {
        events.push(request_will_be_sent(&id, &url));
        events.push(response_received(&id, &url, 200));
        events.push(loading_finished(&id));
    };
    push("L0".to_string(), "https://example.com/".to_string());
    for n in 1..=subresources {
        push(format!("R{n}"), format!("https://cdn{}.example.net/{n}.js", n % 3));
    }
    events
}

//-----------------------------------------------------------------------------
// Browser
//-----------------------------------------------------------------------------

/// What a fake browser does when driven.
#[derive(Clone, Default)]
pub struct BrowserScript {
    /// Events emitted while the page loads
    pub events: Vec<ProtocolEvent>,
    pub launch_error: Option<String>,
    pub navigation_error: Option<String>,
    pub navigation_delay: Duration,
    /// Navigation never resolves
    pub navigation_hangs: bool,
    /// Keeps emitting network events at this interval after the load
    pub chatter: Option<Duration>,
    pub close_fails: bool,
    pub jar: Vec<CookieRecord>,
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub script: BrowserScript,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(script: BrowserScript) -> Self {
        FakeLauncher {
            script,
            ..Self::default()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        _options: &BrowserOptions,
        events: mpsc::Sender<ProtocolEvent>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.launch_error {
            return Err(BrowserError::Launch(message.clone()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            events,
            closes: Arc::clone(&self.closes),
            chatter: Mutex::new(None),
        }))
    }
}

pub struct FakeSession {
    script: BrowserScript,
    events: mpsc::Sender<ProtocolEvent>,
    closes: Arc<AtomicUsize>,
    chatter: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn set_user_agent(&self, _user_agent: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
        if self.script.navigation_hangs {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.script.navigation_delay).await;
        for event in &self.script.events {
            if self.events.send(event.clone()).await.is_err() {
                return Err(BrowserError::Closed);
            }
        }
        if let Some(message) = &self.script.navigation_error {
            return Err(BrowserError::Navigation(message.clone()));
        }
        if let Some(interval) = self.script.chatter {
            let events = self.events.clone();
            let handle = tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    let event = ProtocolEvent::new(
                        EVENT_DATA_RECEIVED,
                        json!({"requestId": "L0", "dataLength": 64}),
                    );
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            });
            *self.chatter.lock().unwrap() = Some(handle);
        }
        Ok(())
    }

    async fn load_time(&self) -> Result<f64, BrowserError> {
        Ok(842.0)
    }

    async fn response_body(&self, request_id: &str) -> Result<String, BrowserError> {
        Ok(format!("body of {request_id}"))
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        Ok(self.script.jar.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.chatter.lock().unwrap().take() {
            handle.abort();
        }
        if self.script.close_fails {
            return Err(BrowserError::Command("target crashed".to_string()));
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Result store
//-----------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub fail: bool,
    pub hang: bool,
    pub entries: Mutex<Vec<(String, Vec<CapturedRequest>)>>,
    pub summaries: Mutex<Vec<JobSummary>>,
}

impl MemoryStore {
    pub fn failing() -> Self {
        MemoryStore {
            fail: true,
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        MemoryStore {
            hang: true,
            ..Self::default()
        }
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.summaries.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<(String, Vec<CapturedRequest>)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_trace_entries(
        &self,
        job_id: &str,
        entries: &[CapturedRequest],
    ) -> Result<usize, DatabaseError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(DatabaseError::CircuitOpen);
        }
        self.entries
            .lock()
            .unwrap()
            .push((job_id.to_string(), entries.to_vec()));
        Ok(entries.len())
    }

    async fn insert_summary(&self, summary: &JobSummary) -> Result<(), DatabaseError> {
        if self.fail {
            return Err(DatabaseError::CircuitOpen);
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Broker
//-----------------------------------------------------------------------------

/// Everything the dispatcher did with the broker, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected { prefetch: u16 },
    Pulled(u64),
    Acked(u64),
    Rejected { tag: u64, requeue: bool },
    Closed,
}

pub type BrokerLog = Arc<Mutex<Vec<BrokerEvent>>>;

/// Serves queued bodies, then either idles or ends the stream.
pub struct FakeConnector {
    pub queue: String,
    pub batches: Mutex<VecDeque<Vec<Vec<u8>>>>,
    pub failing_connects: AtomicUsize,
    /// End the stream once a batch is exhausted instead of waiting
    pub end_after_batch: bool,
    pub log: BrokerLog,
}

impl FakeConnector {
    pub fn new(bodies: Vec<Vec<u8>>) -> Self {
        Self::with_batches(vec![bodies], false)
    }

    pub fn with_batches(batches: Vec<Vec<Vec<u8>>>, end_after_batch: bool) -> Self {
        FakeConnector {
            queue: "jobs".to_string(),
            batches: Mutex::new(batches.into_iter().collect()),
            failing_connects: AtomicUsize::new(0),
            end_after_batch,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn settled(&self) -> Vec<BrokerEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, BrokerEvent::Acked(_) | BrokerEvent::Rejected { .. }))
            .collect()
    }
}

#[async_trait]
impl BrokerConnector for FakeConnector {
    async fn connect(&self, prefetch: u16) -> Result<Box<dyn MessageSource>, BrokerError> {
        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(BrokerError::Connect("connection refused".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .push(BrokerEvent::Connected { prefetch });
        let bodies = self.batches.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(FakeSource {
            pending: bodies.into_iter().collect(),
            next_tag: 1,
            end_when_empty: self.end_after_batch,
            log: Arc::clone(&self.log),
        }))
    }

    fn queue(&self) -> &str {
        &self.queue
    }
}

pub struct FakeSource {
    pending: VecDeque<Vec<u8>>,
    next_tag: u64,
    end_when_empty: bool,
    log: BrokerLog,
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn next_message(&mut self) -> Option<Result<QueueMessage, BrokerError>> {
        let Some(body) = self.pending.pop_front() else {
            if self.end_when_empty {
                return None;
            }
            return std::future::pending().await;
        };
        let delivery_tag = self.next_tag;
        self.next_tag += 1;
        self.log.lock().unwrap().push(BrokerEvent::Pulled(delivery_tag));
        Some(Ok(QueueMessage {
            delivery_tag,
            body,
            acker: Box::new(FakeAcker {
                delivery_tag,
                log: Arc::clone(&self.log),
            }),
        }))
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().push(BrokerEvent::Closed);
    }
}

pub struct FakeAcker {
    delivery_tag: u64,
    log: BrokerLog,
}

#[async_trait]
impl Acknowledge for FakeAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.log
            .lock()
            .unwrap()
            .push(BrokerEvent::Acked(self.delivery_tag));
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.log.lock().unwrap().push(BrokerEvent::Rejected {
            tag: self.delivery_tag,
            requeue,
        });
        Ok(())
    }
}

/// Polls `condition` every 10 ms until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
