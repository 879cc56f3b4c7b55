//! Error types for trust material synchronisation

use chrono::{DateTime, Utc};
use error_common::{codes, CodedError, ErrorCategory};
use thiserror::Error;

/// Errors are `Clone` because a single refresh outcome is handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("Fetch from remote authority failed: {0}")]
    Fetch(String),

    #[error("Cached {kind} data last checked at {last_check} exceeds its maximum age and could not be refreshed: {reason}")]
    StaleBeyondLimit {
        kind: &'static str,
        last_check: DateTime<Utc>,
        reason: String,
    },

    #[error("No {kind} data has ever been cached and the initial download failed: {reason}")]
    NoTrustData { kind: &'static str, reason: String },

    #[error("Local store error: {0}")]
    Storage(String),

    #[error("Could not decode {kind} data: {reason}")]
    Decode { kind: &'static str, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Refresh task aborted: {0}")]
    RefreshAborted(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl TrustError {
    pub fn decode(kind: &'static str, reason: impl ToString) -> Self {
        TrustError::Decode {
            kind,
            reason: reason.to_string(),
        }
    }
}

impl CodedError for TrustError {
    fn code(&self) -> &'static str {
        match self {
            TrustError::Fetch(_) => codes::trust::FETCH_FAILED,
            TrustError::StaleBeyondLimit { .. } => codes::trust::STALE_BEYOND_LIMIT,
            TrustError::NoTrustData { .. } => codes::trust::NO_TRUST_DATA,
            TrustError::Storage(_) | TrustError::Serialization(_) => codes::trust::STORAGE_FAILED,
            TrustError::Decode { .. } => codes::trust::DECODE_FAILED,
            TrustError::RefreshAborted(_) => codes::trust::REFRESH_ABORTED,
            TrustError::Configuration(_) => codes::trust::INVALID_CONFIGURATION,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            TrustError::Fetch(_) => ErrorCategory::Network,
            TrustError::StaleBeyondLimit { .. } | TrustError::NoTrustData { .. } => {
                ErrorCategory::Staleness
            }
            TrustError::Storage(_) | TrustError::Serialization(_) => ErrorCategory::Storage,
            TrustError::Decode { .. } => ErrorCategory::Decoding,
            TrustError::RefreshAborted(_) => ErrorCategory::Internal,
            TrustError::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Fetch, storage and decode failures leave the previous cache in place
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrustError::Fetch(_)
                | TrustError::Storage(_)
                | TrustError::Serialization(_)
                | TrustError::Decode { .. }
                | TrustError::RefreshAborted(_)
        )
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        TrustError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TrustError {
    fn from(err: std::io::Error) -> Self {
        TrustError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for TrustError {
    fn from(err: reqwest::Error) -> Self {
        TrustError::Fetch(err.to_string())
    }
}

impl From<config::ConfigError> for TrustError {
    fn from(err: config::ConfigError) -> Self {
        TrustError::Configuration(err.to_string())
    }
}

pub type TrustResult<T> = Result<T, TrustError>;
