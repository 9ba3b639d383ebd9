//! Error type definitions.
//!
//! This module defines the error types used throughout the worker, one enum
//! per layer, plus the outcome kinds tracked by the dispatcher statistics.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for startup failures. All of them are fatal.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error opening the results database.
    #[error("Database initialization error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// A record could not be encoded as a JSON document.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Writes are suspended after repeated failures.
    #[error("Database writes suspended by circuit breaker")]
    CircuitOpen,
}

/// Error types for broker connection, channel and delivery handling.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The connection could not be opened.
    #[error("Broker connection error: {0}")]
    Connect(String),

    /// Channel creation, queue declaration or QoS failed.
    #[error("Broker channel error: {0}")]
    Channel(String),

    /// The delivery stream reported an error.
    #[error("Broker consume error: {0}")]
    Consume(String),

    /// Acknowledging or rejecting a delivery failed.
    #[error("Broker acknowledgement error: {0}")]
    Acknowledge(String),

    /// The delivery stream ended.
    #[error("Broker connection closed")]
    ConnectionClosed,

    /// Connection attempts exhausted the reconnect budget.
    #[error("Broker reconnect budget exhausted after {attempts} attempt(s): {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },
}

/// Error types for browser launch, commands and navigation.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("Browser launch error: {0}")]
    Launch(String),

    /// A protocol command failed.
    #[error("Browser command error: {0}")]
    Command(String),

    /// Navigation failed for a reason other than the deadline.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// The browser went away before the command completed.
    #[error("Browser closed")]
    Closed,
}

/// Error types for decoding a queue message into a job.
#[derive(Error, Debug)]
pub enum JobConfigError {
    /// Body is not valid UTF-8.
    #[error("Job body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Body is not a valid serialized job.
    #[error("Job body is not a valid job config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The target URL cannot be analysed.
    #[error("Job URL rejected: {0}")]
    InvalidUrl(String),
}

/// Kinds of terminal job outcome, used as statistics keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeKind {
    Done,
    TimeoutNavigation,
    TimeoutProcess,
    Error,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Done => "Done",
            OutcomeKind::TimeoutNavigation => "TimeoutNavigation",
            OutcomeKind::TimeoutProcess => "TimeoutProcess",
            OutcomeKind::Error => "Error",
        }
    }
}

/// What the dispatcher did with a delivery once its job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum DeliveryAction {
    Acked,
    Rejected,
    AckFailed,
}

impl DeliveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryAction::Acked => "acked",
            DeliveryAction::Rejected => "rejected",
            DeliveryAction::AckFailed => "ack/nack failed",
        }
    }
}
