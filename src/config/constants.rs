//! Configuration constants.
//!
//! This module defines the constants used throughout the worker, including
//! timeouts, capacities, default job values and the protocol event families
//! that are recorded during a page load.

use std::time::Duration;

/// Default maximum number of jobs running at the same time.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
/// Interval in seconds between two outcome statistics log lines.
pub const LOGGING_INTERVAL: usize = 5;
pub const DB_PATH: &str = "./page_trace.db";
/// Consecutive write failures that open the database circuit breaker.
pub const DB_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
/// How long writes stay suspended once the circuit breaker opened.
pub const DB_CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(60);

// Broker defaults
pub const DEFAULT_AMQP_HOST: &str = "localhost";
pub const DEFAULT_AMQP_PORT: u16 = 5672;
pub const DEFAULT_AMQP_USERNAME: &str = "guest";
pub const DEFAULT_AMQP_PASSWORD: &str = "guest";
pub const DEFAULT_QUEUE_NAME: &str = "analyser";
/// AMQP heartbeat in seconds, also bounds how long a dead consumer goes unnoticed.
pub const DEFAULT_AMQP_HEARTBEAT_SECS: u16 = 60;
pub const CONSUMER_TAG: &str = "page_trace";

// Job timeouts
/// Hard per-job deadline in seconds (covers hangs after navigation).
pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 20;
/// Navigation deadline in milliseconds. 0 disables the navigation deadline.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 0;
/// Quiet period after navigation before a job counts as complete.
pub const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
/// Extra time granted to finalization on top of the process timeout before
/// the dispatcher gives up on a job task.
pub const FINALIZATION_GRACE: Duration = Duration::from_secs(15);
/// Best-effort response body retrieval.
pub const RESPONSE_BODY_TIMEOUT: Duration = Duration::from_secs(5);
pub const COOKIE_JAR_TIMEOUT: Duration = Duration::from_secs(5);
pub const BROWSER_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const BROWSER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the bounded channel between browser listeners and the job runner.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// Reconnect strategy
/// Initial delay in milliseconds before the first reconnect attempt
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 1000;
/// Factor by which the reconnect delay is multiplied on each attempt
pub const RECONNECT_FACTOR: u64 = 2;
/// Maximum delay between reconnect attempts in seconds
pub const RECONNECT_MAX_DELAY_SECS: u64 = 30;

// Default job
/// URL analysed when a message arrives without a body.
pub const DEFAULT_JOB_URL: &str = "https://example.com/";
pub const DEFAULT_JOB_NAME: &str = "demo";

/// Default User-Agent used when a job carries no override.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/81.0.4044.113 Safari/537.36";

// Browser launch
pub const BROWSER_WINDOW_WIDTH: u32 = 1920;
pub const BROWSER_WINDOW_HEIGHT: u32 = 1170;
pub const BROWSER_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--window-position=0,0",
    "--lang=en-GB,en",
    "--disable-dev-shm-usage",
];
pub const HEADER_ACCEPT_LANGUAGE: &str = "fr,fr-FR;q=0.8,en-US;q=0.5,en;q=0.3";
pub const HEADER_ACCEPT_ENCODING: &str = "gzip, deflate, br";

// Protocol event families
pub const EVENT_LOAD_EVENT_FIRED: &str = "Page.loadEventFired";
pub const EVENT_DOM_CONTENT_FIRED: &str = "Page.domContentEventFired";
pub const EVENT_FRAME_STARTED_LOADING: &str = "Page.frameStartedLoading";
pub const EVENT_FRAME_ATTACHED: &str = "Page.frameAttached";
pub const EVENT_FRAME_DETACHED: &str = "Page.frameDetached";
pub const EVENT_REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const EVENT_REQUEST_SERVED_FROM_CACHE: &str = "Network.requestServedFromCache";
pub const EVENT_DATA_RECEIVED: &str = "Network.dataReceived";
pub const EVENT_RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const EVENT_LOADING_FINISHED: &str = "Network.loadingFinished";
pub const EVENT_LOADING_FAILED: &str = "Network.loadingFailed";
pub const EVENT_RESPONSE_RECEIVED_EXTRA_INFO: &str = "Network.responseReceivedExtraInfo";

/// Event families recorded in the protocol event log.
pub const OBSERVED_EVENTS: &[&str] = &[
    EVENT_LOAD_EVENT_FIRED,
    EVENT_DOM_CONTENT_FIRED,
    EVENT_FRAME_STARTED_LOADING,
    EVENT_FRAME_ATTACHED,
    EVENT_FRAME_DETACHED,
    EVENT_REQUEST_WILL_BE_SENT,
    EVENT_REQUEST_SERVED_FROM_CACHE,
    EVENT_DATA_RECEIVED,
    EVENT_RESPONSE_RECEIVED,
    EVENT_LOADING_FINISHED,
    EVENT_LOADING_FAILED,
    EVENT_RESPONSE_RECEIVED_EXTRA_INFO,
];

// Extras keys
/// Extras key holding the raw response timing payload.
pub const EXTRAS_NETWORK_TIMING: &str = "NetworkTiming";
/// Extras key holding the response extra-info payload (without raw header text).
pub const EXTRAS_RESPONSE_EXTRA_INFO: &str = EVENT_RESPONSE_RECEIVED_EXTRA_INFO;

/// Maximum URL length accepted for a job.
pub const MAX_URL_LENGTH: usize = 2048;
