//! Browser control.
//!
//! The runner drives a browser through two narrow traits: a launcher that
//! starts one isolated browser per job, and the session it returns. Protocol
//! events flow out of the session through the channel handed to `launch`,
//! never through callbacks into the runner.

mod chrome;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error_handling::BrowserError;
use crate::trace::{CookieRecord, ProtocolEvent};

pub use chrome::ChromeLauncher;

/// Launch settings shared by every job.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable_path: Option<PathBuf>,
}

impl From<&Config> for BrowserOptions {
    fn from(config: &Config) -> Self {
        BrowserOptions {
            headless: config.headless,
            executable_path: config.executable_path.clone(),
        }
    }
}

/// Browser binary to launch: the override when given, else the usual Chrome
/// location for the platform. `None` lets the driver search for one.
pub fn chrome_path(override_path: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.clone());
    }
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ))
    } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
        Some(PathBuf::from("/usr/bin/google-chrome"))
    } else {
        None
    }
}

/// One live browser owned by a single job.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn set_user_agent(&self, user_agent: &str) -> Result<(), BrowserError>;

    /// Loads `url` and resolves once the page fired its load event.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// `loadEventEnd - navigationStart` of the current page, in milliseconds.
    async fn load_time(&self) -> Result<f64, BrowserError>;

    async fn response_body(&self, request_id: &str) -> Result<String, BrowserError>;

    /// Current content of the browser cookie jar.
    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts browsers.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a browser whose observed protocol events are sent on `events`.
    ///
    /// Listeners are registered before this returns, so no event of the
    /// following navigation is missed.
    async fn launch(
        &self,
        options: &BrowserOptions,
        events: mpsc::Sender<ProtocolEvent>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_path_prefers_override() {
        let custom = PathBuf::from("/opt/chromium/chrome");
        assert_eq!(chrome_path(Some(&custom)), Some(custom));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_chrome_path_linux_default() {
        assert_eq!(
            chrome_path(None),
            Some(PathBuf::from("/usr/bin/google-chrome"))
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            headless: false,
            executable_path: Some(PathBuf::from("/bin/chrome")),
            ..Config::default()
        };
        let options = BrowserOptions::from(&config);
        assert!(!options.headless);
        assert_eq!(options.executable_path, Some(PathBuf::from("/bin/chrome")));
    }
}
