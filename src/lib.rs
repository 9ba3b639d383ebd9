//! page_trace library: queue-driven page load tracing
//!
//! This library consumes page-analysis jobs from an AMQP queue, loads each
//! target page in an isolated Chrome instance, records the DevTools protocol
//! events of the load, and stores one trace entry per captured request plus a
//! job summary in SQLite.
//!
//! # Example
//!
//! ```no_run
//! use page_trace::{run_dispatcher, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     max_concurrent_jobs: 2,
//!     ..Default::default()
//! };
//!
//! run_dispatcher(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime and a Chrome or Chromium binary.

pub mod app;
pub mod broker;
pub mod browser;
pub mod config;
pub mod dispatcher;
pub mod error_handling;
pub mod initialization;
pub mod job;
pub mod runner;
pub mod storage;
pub mod trace;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use job::{JobConfig, JobOutcome, JobSummary};
pub use runner::{JobRunner, RunnerSettings};
pub use run::run_dispatcher;

mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use tokio_util::sync::CancellationToken;

    use crate::app::cancel_on_ctrl_c;
    use crate::broker::AmqpConnector;
    use crate::browser::ChromeLauncher;
    use crate::config::Config;
    use crate::dispatcher::{Dispatcher, DispatcherSettings};
    use crate::initialization::init_result_store;
    use crate::runner::{JobRunner, RunnerSettings};

    /// Runs the worker until Ctrl-C or until the broker connection is lost
    /// beyond the reconnect budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the results database
    /// cannot be opened, or the dispatcher stopped on a broker failure.
    pub async fn run_dispatcher(config: Config) -> Result<()> {
        config
            .broker
            .validate()
            .context("Invalid broker configuration")?;

        let store = init_result_store(&config.db_path)
            .await
            .with_context(|| format!("Failed to open {}", config.db_path.display()))?;

        let runner = JobRunner::new(
            Arc::new(ChromeLauncher::new()),
            Arc::new(store),
            RunnerSettings::from(&config),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(AmqpConnector::new(config.broker.clone())),
            Arc::new(runner),
            DispatcherSettings::from(&config),
        );

        let shutdown = CancellationToken::new();
        let signal_task = tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

        let result = dispatcher.run(shutdown.clone()).await;

        shutdown.cancel();
        if let Err(e) = signal_task.await {
            log::debug!("Signal listener ended abnormally: {e}");
        }
        result.context("Dispatcher stopped")
    }
}
