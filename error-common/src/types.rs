use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification used to decide how an error is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Remote authority unreachable or returned malformed data
    Network,
    /// Cached data exceeded its absolute age limit
    Staleness,
    /// Local persistence failed
    Storage,
    /// Trust material or rule logic could not be decoded
    Decoding,
    /// Invalid configuration values
    Configuration,
    /// A single rule could not be interpreted
    RuleEvaluation,
    /// Country or engine version has no applicable rule set
    Unsupported,
    /// Internal system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Staleness => "staleness",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Decoding => "decoding",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::RuleEvaluation => "rule_evaluation",
            ErrorCategory::Unsupported => "unsupported",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Implemented by every error enum in the workspace so callers can log and
/// branch on a stable code instead of matching message text.
pub trait CodedError: std::error::Error {
    /// Stable code from [`crate::codes`]
    fn code(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    /// Whether the system is still usable under policy after this error
    fn is_recoverable(&self) -> bool {
        false
    }
}
