//! Common error handling utilities for certificate trust validation
//!
//! Every crate in the workspace defines its own `thiserror` enum and
//! implements [`CodedError`] for it, which gives:
//!
//! - **Stable codes**: machine-readable identifiers from [`codes`]
//! - **Categories**: a coarse [`ErrorCategory`] for routing and metrics
//! - **Recoverability**: whether the failure was absorbed under policy
//!   (stale-but-usable cache, a single malformed rule) or must reach the
//!   caller as "validity could not be determined"
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, CodedError, ErrorCategory, ErrorContext, ErrorReporter};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("upstream unreachable")]
//! struct Unreachable;
//!
//! impl CodedError for Unreachable {
//!     fn code(&self) -> &'static str { codes::trust::FETCH_FAILED }
//!     fn category(&self) -> ErrorCategory { ErrorCategory::Network }
//!     fn is_recoverable(&self) -> bool { true }
//! }
//!
//! ErrorReporter::new().report(
//!     &Unreachable,
//!     &ErrorContext::new().with_trust_material("revocation-list"),
//! );
//! ```

pub mod codes;
pub mod context;
pub mod reporting;
pub mod types;

pub use context::*;
pub use reporting::*;
pub use types::*;
