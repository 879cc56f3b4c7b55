//! Logging setup for certificate trust validation
//!
//! Revocation lookups and rule evaluations handle certificate identifiers
//! (UVCIs, signer key ids) that link back to a person. This crate installs
//! the `tracing` subscriber used across the workspace and a process-wide
//! [`IdentifierRedactor`]. Log sites that pass identifiers through
//! [`redact_identifier`] or [`redact_text`] get hashes instead of raw
//! values unless `redaction_enabled` is turned off.
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init_logging, redact_identifier, LoggerConfig};
//!
//! # fn main() -> Result<(), logger_redacted::LoggerError> {
//! init_logging(&LoggerConfig::default())?;
//! tracing::info!(
//!     identifier = %redact_identifier("URN:UVCI:01:DE:187/37512422923#Z"),
//!     "Revocation lookup"
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod redactor;

pub use config::*;
pub use redactor::*;

use error_common::{codes, CodedError, ErrorCategory};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialised,

    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),
}

impl CodedError for LoggerError {
    fn code(&self) -> &'static str {
        match self {
            LoggerError::AlreadyInitialised => codes::logging::ALREADY_INITIALISED,
            LoggerError::InvalidFilter(_) => codes::logging::INVALID_FILTER,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, LoggerError::AlreadyInitialised)
    }
}

/// Install the global fmt subscriber and the process-wide identifier
/// redactor. `RUST_LOG` takes precedence over `config.log_level`.
///
/// The redactor is replaced even when the subscriber cannot be installed.
///
/// # Errors
///
/// Returns [`LoggerError::InvalidFilter`] for an unparsable level and
/// [`LoggerError::AlreadyInitialised`] when called twice.
pub fn init_logging(config: &LoggerConfig) -> Result<(), LoggerError> {
    install_global_redactor(IdentifierRedactor::new(RedactionConfig {
        enabled: config.redaction_enabled,
        ..RedactionConfig::default()
    }));

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|_| LoggerError::InvalidFilter(config.log_level.clone()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialised)
}
