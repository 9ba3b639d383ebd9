//! Configuration types and CLI options.
//!
//! This module defines the library `Config`, the `clap` options it is built
//! from, and the small policy structs the dispatcher and runner consume.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use url::Url;

use crate::config::constants::*;
use crate::error_handling::InitializationError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub queue: String,
    pub heartbeat_secs: u16,
}

impl BrokerConfig {
    /// Checks that every field needed to open a connection is present.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::ConfigError` naming the first missing field.
    pub fn validate(&self) -> Result<(), InitializationError> {
        let missing = if self.host.trim().is_empty() {
            Some("host")
        } else if self.port == 0 {
            Some("port")
        } else if self.username.is_empty() {
            Some("username")
        } else if self.password.is_empty() {
            Some("password")
        } else if self.queue.trim().is_empty() {
            Some("queue")
        } else {
            None
        };
        match missing {
            Some(field) => Err(InitializationError::ConfigError(format!(
                "broker {field} must be set (username, password, hostname, port and queue are required)"
            ))),
            None => Ok(()),
        }
    }

    /// AMQP URI with the heartbeat carried as a query parameter.
    ///
    /// Credentials are percent-encoded, so reserved characters in the
    /// username or password cannot shift the host or port.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::ConfigError` when the host and port do
    /// not form a valid authority.
    pub fn uri(&self) -> Result<String, InitializationError> {
        let invalid = |reason: String| {
            InitializationError::ConfigError(format!("invalid broker address: {reason}"))
        };
        let mut uri = Url::parse(&format!("amqp://{}:{}/%2f", self.host, self.port))
            .map_err(|e| invalid(e.to_string()))?;
        uri.set_username(&self.username)
            .map_err(|_| invalid("username rejected".to_string()))?;
        uri.set_password(Some(&self.password))
            .map_err(|_| invalid("password rejected".to_string()))?;
        uri.query_pairs_mut()
            .append_pair("heartbeat", &self.heartbeat_secs.to_string());
        Ok(uri.to_string())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_AMQP_HOST.to_string(),
            port: DEFAULT_AMQP_PORT,
            username: DEFAULT_AMQP_USERNAME.to_string(),
            password: DEFAULT_AMQP_PASSWORD.to_string(),
            queue: DEFAULT_QUEUE_NAME.to_string(),
            heartbeat_secs: DEFAULT_AMQP_HEARTBEAT_SECS,
        }
    }
}

/// How the dispatcher reacts to a lost broker connection.
///
/// `max_reconnects == 0` means the dispatcher returns an error on connection
/// loss and leaves restarting to the process supervisor.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_reconnects: u32,
    pub initial_delay_ms: u64,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn allows(&self, reconnects_so_far: u32) -> bool {
        reconnects_so_far < self.max_reconnects
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_reconnects: 0,
            initial_delay_ms: RECONNECT_INITIAL_DELAY_MS,
            max_delay: Duration::from_secs(RECONNECT_MAX_DELAY_SECS),
        }
    }
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically without any CLI dependencies.
///
/// # Examples
///
/// ```no_run
/// use page_trace::Config;
///
/// let config = Config {
///     max_concurrent_jobs: 8,
///     headless: false,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Broker connection settings
    pub broker: BrokerConfig,

    /// Database path (SQLite file)
    pub db_path: PathBuf,

    /// Navigation deadline; `None` leaves navigation unbounded
    pub navigation_timeout: Option<Duration>,

    /// Hard per-job deadline
    pub process_timeout: Duration,

    /// Quiet period after navigation that marks a job as complete
    pub network_idle: Duration,

    /// Run the browser without a window
    pub headless: bool,

    /// Browser binary override
    pub executable_path: Option<PathBuf>,

    /// Maximum number of jobs running at once (also the channel prefetch)
    pub max_concurrent_jobs: usize,

    /// Reconnect behaviour on broker connection loss
    pub reconnect: ReconnectPolicy,

    /// Whether rejected messages go back to the queue
    pub requeue_rejected: bool,

    /// URL analysed when a message has no body
    pub default_job_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            broker: BrokerConfig::default(),
            db_path: PathBuf::from(DB_PATH),
            navigation_timeout: None,
            process_timeout: Duration::from_secs(DEFAULT_PROCESS_TIMEOUT_SECS),
            network_idle: Duration::from_millis(DEFAULT_NETWORK_IDLE_MS),
            headless: true,
            executable_path: None,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            reconnect: ReconnectPolicy::default(),
            requeue_rejected: true,
            default_job_url: DEFAULT_JOB_URL.to_string(),
        }
    }
}

/// Command-line options and configuration.
///
/// Every option can also be set through the environment (or a `.env` file),
/// which is how the worker is usually deployed.
///
/// # Examples
///
/// ```bash
/// # Consume the default queue with a visible browser
/// HEADLESS=false page_trace
///
/// # Bound navigation to 15 seconds and jobs to 60 seconds
/// TIMEOUT=15000 PROCESS_TIMEOUT=60 page_trace --max-concurrent-jobs 2
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "page_trace",
    about = "Consumes page-analysis jobs and records a per-request timing waterfall."
)]
pub struct Opt {
    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, env = "LOG_LEVEL", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Verbose logging (forces the debug level)
    #[arg(long, env = "DEBUG", default_value_t = false, action = ArgAction::Set)]
    pub debug: bool,

    /// Broker host name
    #[arg(long, env = "AMQP_HOST", default_value = DEFAULT_AMQP_HOST)]
    pub amqp_host: String,

    /// Broker port
    #[arg(long, env = "AMQP_PORT", default_value_t = DEFAULT_AMQP_PORT)]
    pub amqp_port: u16,

    /// Broker user name
    #[arg(long, env = "AMQP_USERNAME", default_value = DEFAULT_AMQP_USERNAME)]
    pub amqp_username: String,

    /// Broker password
    #[arg(long, env = "AMQP_PASSWORD", default_value = DEFAULT_AMQP_PASSWORD, hide_env_values = true)]
    pub amqp_password: String,

    /// Queue to consume jobs from
    #[arg(long, env = "AMQP_QUEUE", default_value = DEFAULT_QUEUE_NAME)]
    pub queue: String,

    /// Broker heartbeat in seconds
    #[arg(long, env = "AMQP_HEARTBEAT", default_value_t = DEFAULT_AMQP_HEARTBEAT_SECS)]
    pub heartbeat: u16,

    /// Database path (SQLite file)
    #[arg(long, env = "RESULTS_DB_PATH", value_parser, default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Navigation deadline in milliseconds (0 = no deadline)
    #[arg(long = "timeout", env = "TIMEOUT", default_value_t = DEFAULT_NAVIGATION_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Hard per-job deadline in seconds
    #[arg(long = "process-timeout", env = "PROCESS_TIMEOUT", default_value_t = DEFAULT_PROCESS_TIMEOUT_SECS)]
    pub process_timeout_secs: u64,

    /// Quiet period after navigation, in milliseconds, that completes a job
    #[arg(long = "network-idle", env = "NETWORK_IDLE_MS", default_value_t = DEFAULT_NETWORK_IDLE_MS)]
    pub network_idle_ms: u64,

    /// Run the browser headless
    #[arg(long, env = "HEADLESS", default_value_t = true, action = ArgAction::Set)]
    pub headless: bool,

    /// Browser binary to launch instead of the platform default
    #[arg(long = "exec-path", env = "EXECPATH")]
    pub exec_path: Option<PathBuf>,

    /// Maximum number of jobs running at once
    #[arg(long, env = "MAX_CONCURRENT_JOBS", default_value_t = DEFAULT_MAX_CONCURRENT_JOBS)]
    pub max_concurrent_jobs: usize,

    /// Reconnect attempts after the broker connection is lost (0 = exit)
    #[arg(long, env = "RECONNECT_ATTEMPTS", default_value_t = 0)]
    pub reconnect_attempts: u32,

    /// Initial delay between reconnect attempts in milliseconds
    #[arg(long, env = "RECONNECT_DELAY_MS", default_value_t = RECONNECT_INITIAL_DELAY_MS)]
    pub reconnect_delay_ms: u64,

    /// Put rejected messages back on the queue
    #[arg(long, env = "REQUEUE_REJECTED", default_value_t = true, action = ArgAction::Set)]
    pub requeue_rejected: bool,

    /// URL analysed when a message arrives without a body
    #[arg(long = "default-url", env = "URL", default_value = DEFAULT_JOB_URL)]
    pub default_url: String,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Self {
        let log_level = if opt.debug {
            LogLevel::Debug
        } else {
            opt.log_level
        };
        let navigation_timeout = match opt.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self {
            log_level,
            log_format: opt.log_format,
            broker: BrokerConfig {
                host: opt.amqp_host,
                port: opt.amqp_port,
                username: opt.amqp_username,
                password: opt.amqp_password,
                queue: opt.queue,
                heartbeat_secs: opt.heartbeat,
            },
            db_path: opt.db_path,
            navigation_timeout,
            process_timeout: Duration::from_secs(opt.process_timeout_secs),
            network_idle: Duration::from_millis(opt.network_idle_ms),
            headless: opt.headless,
            executable_path: opt.exec_path,
            max_concurrent_jobs: opt.max_concurrent_jobs.max(1),
            reconnect: ReconnectPolicy {
                max_reconnects: opt.reconnect_attempts,
                initial_delay_ms: opt.reconnect_delay_ms,
                max_delay: Duration::from_secs(RECONNECT_MAX_DELAY_SECS),
            },
            requeue_rejected: opt.requeue_rejected,
            default_job_url: opt.default_url,
        }
    }
}
