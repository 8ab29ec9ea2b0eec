//! Error types for scheduler operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A protocol timestamp could not be converted to an in-process time.
    #[error("invalid timestamp: seconds={seconds} nanos={nanos}")]
    InvalidTimestamp {
        /// Raw seconds component.
        seconds: i64,
        /// Raw nanoseconds component.
        nanos: i32,
    },
    /// The scheduler clock was asked to move backwards.
    #[error("time regression: {requested} is before {previous}")]
    TimeRegression {
        /// Last time the scheduler accepted.
        previous: DateTime<Utc>,
        /// Rejected time.
        requested: DateTime<Utc>,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Coarse error classification for mapping onto RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed timestamp input.
    InvalidTimestamp,
    /// Clock moved backwards.
    TimeRegression,
    /// Bad configuration.
    InvalidConfig,
    /// Failure inside the scheduling engine.
    Backend,
}

impl SchedulerError {
    /// Classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTimestamp { .. } => ErrorKind::InvalidTimestamp,
            Self::TimeRegression { .. } => ErrorKind::TimeRegression,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
