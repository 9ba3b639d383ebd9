//! Chrome driven over the DevTools protocol with `chromiumoxide`.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventDataReceived, EventLoadingFailed, EventLoadingFinished,
    EventRequestServedFromCache, EventRequestWillBeSent, EventResponseReceived,
    EventResponseReceivedExtraInfo, GetResponseBodyParams, Headers, RequestId,
    SetCacheDisabledParams, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    self, EventDomContentEventFired, EventFrameAttached, EventFrameDetached,
    EventFrameStartedLoading, EventLoadEventFired,
};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams as GetAllCookiesParams;
use chromiumoxide::cdp::IntoEventKind;
use chromiumoxide::Page;
use futures::StreamExt;
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::*;
use crate::error_handling::BrowserError;
use crate::trace::{CookieRecord, ProtocolEvent};

use super::{chrome_path, BrowserLauncher, BrowserOptions, BrowserSession};

const LOAD_TIME_SCRIPT: &str = "performance.timing.loadEventEnd - performance.timing.navigationStart";

fn command_error(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Command(e.to_string())
}

/// Body text as a page script would read it. Binary bodies arrive base64
/// encoded and are decoded, lossily for non UTF-8 content.
fn body_text(body: String, base64_encoded: bool) -> String {
    if !base64_encoded {
        return body;
    }
    match general_purpose::STANDARD.decode(body.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Keeping undecodable base64 body as received: {e}");
            body
        }
    }
}

/// Converts protocol cookies into records, skipping any that do not
/// serialize to an object.
fn jar_records<T: Serialize>(cookies: &[T]) -> Vec<CookieRecord> {
    let mut records = Vec::with_capacity(cookies.len());
    for cookie in cookies {
        match serde_json::to_value(cookie) {
            Ok(serde_json::Value::Object(fields)) => {
                records.push(CookieRecord::from_fields(&fields))
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable cookie: {e}"),
        }
    }
    records
}

/// Launches a local Chrome per job.
#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        ChromeLauncher
    }
}

fn browser_config(options: &BrowserOptions) -> Result<BrowserConfig, BrowserError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .window_size(BROWSER_WINDOW_WIDTH, BROWSER_WINDOW_HEIGHT)
        .viewport(None)
        .args(BROWSER_ARGS.iter().copied());
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(path) = chrome_path(options.executable_path.as_ref()) {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(BrowserError::Launch)
}

/// Forwards every event of type `T` from the page into the job's channel.
///
/// The task ends when the page's event stream ends or the runner dropped its
/// receiver.
async fn forward<T>(
    page: &Page,
    method: &'static str,
    events: mpsc::Sender<ProtocolEvent>,
) -> Result<JoinHandle<()>, BrowserError>
where
    T: IntoEventKind + Serialize + Unpin + Send + Sync + 'static,
{
    let mut stream = page.event_listener::<T>().await.map_err(command_error)?;
    Ok(tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let params = match serde_json::to_value(&*event) {
                Ok(params) => params,
                Err(e) => {
                    debug!("Dropping unserializable {method} event: {e}");
                    continue;
                }
            };
            if events.send(ProtocolEvent::new(method, params)).await.is_err() {
                break;
            }
        }
    }))
}

async fn register_listeners(
    page: &Page,
    events: &mpsc::Sender<ProtocolEvent>,
) -> Result<Vec<JoinHandle<()>>, BrowserError> {
    Ok(vec![
        forward::<EventLoadEventFired>(page, EVENT_LOAD_EVENT_FIRED, events.clone()).await?,
        forward::<EventDomContentEventFired>(page, EVENT_DOM_CONTENT_FIRED, events.clone()).await?,
        forward::<EventFrameStartedLoading>(page, EVENT_FRAME_STARTED_LOADING, events.clone())
            .await?,
        forward::<EventFrameAttached>(page, EVENT_FRAME_ATTACHED, events.clone()).await?,
        forward::<EventFrameDetached>(page, EVENT_FRAME_DETACHED, events.clone()).await?,
        forward::<EventRequestWillBeSent>(page, EVENT_REQUEST_WILL_BE_SENT, events.clone()).await?,
        forward::<EventRequestServedFromCache>(
            page,
            EVENT_REQUEST_SERVED_FROM_CACHE,
            events.clone(),
        )
        .await?,
        forward::<EventDataReceived>(page, EVENT_DATA_RECEIVED, events.clone()).await?,
        forward::<EventResponseReceived>(page, EVENT_RESPONSE_RECEIVED, events.clone()).await?,
        forward::<EventLoadingFinished>(page, EVENT_LOADING_FINISHED, events.clone()).await?,
        forward::<EventLoadingFailed>(page, EVENT_LOADING_FAILED, events.clone()).await?,
        forward::<EventResponseReceivedExtraInfo>(
            page,
            EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
            events.clone(),
        )
        .await?,
    ])
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        options: &BrowserOptions,
        events: mpsc::Sender<ProtocolEvent>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let config = browser_config(options)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(e) = result {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        let session = ChromeSession {
            browser: Mutex::new(browser),
            page,
            handler,
            forwarders: Vec::new(),
        };
        let session = session.prepare(events).await?;
        Ok(Box::new(session))
    }
}

/// One Chrome process with the single page a job drives.
pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    forwarders: Vec<JoinHandle<()>>,
}

impl ChromeSession {
    /// Registers listeners and configures the page before any navigation.
    async fn prepare(mut self, events: mpsc::Sender<ProtocolEvent>) -> Result<Self, BrowserError> {
        match self.configure(&events).await {
            Ok(forwarders) => {
                self.forwarders = forwarders;
                Ok(self)
            }
            Err(e) => {
                if let Err(close_error) = self.close().await {
                    debug!("Ignoring close failure after setup error: {close_error}");
                }
                Err(e)
            }
        }
    }

    async fn configure(
        &self,
        events: &mpsc::Sender<ProtocolEvent>,
    ) -> Result<Vec<JoinHandle<()>>, BrowserError> {
        let forwarders = register_listeners(&self.page, events).await?;
        debug!("Listening for {}", OBSERVED_EVENTS.join(", "));

        self.page
            .execute(page::EnableParams::default())
            .await
            .map_err(command_error)?;
        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(command_error)?;
        self.page
            .execute(SetCacheDisabledParams::new(true))
            .await
            .map_err(command_error)?;
        let headers = serde_json::json!({
            "Accept-Language": HEADER_ACCEPT_LANGUAGE,
            "Accept-Encoding": HEADER_ACCEPT_ENCODING,
        });
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
            .await
            .map_err(command_error)?;

        Ok(forwarders)
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn set_user_agent(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn load_time(&self) -> Result<f64, BrowserError> {
        self.page
            .evaluate(LOAD_TIME_SCRIPT)
            .await
            .map_err(command_error)?
            .into_value::<f64>()
            .map_err(command_error)
    }

    async fn response_body(&self, request_id: &str) -> Result<String, BrowserError> {
        let response = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(command_error)?;
        let returns = response.result;
        Ok(body_text(returns.body, returns.base64_encoded))
    }

    /// Every cookie in the browser jar, third-party domains included.
    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        let response = self
            .page
            .execute(GetAllCookiesParams::default())
            .await
            .map_err(command_error)?;
        Ok(jar_records(&response.result.cookies))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(command_error);
        if let Err(e) = browser.wait().await {
            debug!("Waiting for the browser process failed: {e}");
        }
        self.handler.abort();
        closed
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_text_decodes_base64_bodies() {
        assert_eq!(body_text("<html></html>".to_string(), false), "<html></html>");
        assert_eq!(body_text("aGVsbG8gd29ybGQ=".to_string(), true), "hello world");
        // Raw text flagged as base64 by mistake is kept.
        assert_eq!(body_text("not base64!".to_string(), true), "not base64!");
    }

    #[test]
    fn test_jar_records_keep_every_domain() {
        let jar = vec![
            json!({"name": "sid", "value": "1", "domain": "www.example.com", "path": "/"}),
            json!({"name": "_ga", "value": "GA1", "domain": ".tracker.example.net", "path": "/"}),
            json!("not a cookie"),
        ];
        let records = jar_records(&jar);

        assert_eq!(records.len(), 2);
        let domains: Vec<_> = records.iter().filter_map(|c| c.domain.as_deref()).collect();
        assert_eq!(domains, vec!["www.example.com", ".tracker.example.net"]);
    }
}
