//! Remote-fetch seam. Transport details live in the implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrustResult;
use crate::progress::ProgressObserver;

/// Answer to "is there something newer than what I have?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheck {
    /// Version currently published by the authority
    pub version: String,
    /// Explicit hint from the authority; a differing version implies it too
    #[serde(default)]
    pub newer_available: bool,
}

impl VersionCheck {
    pub fn requires_download(&self, current: Option<&str>) -> bool {
        match current {
            None => true,
            Some(current) => self.newer_available || current != self.version,
        }
    }
}

/// Full data response; the payload is opaque to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedData {
    pub version: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait TrustDataClient: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::TrustError::Fetch`] when the authority is unreachable
    /// or answers with malformed data.
    async fn check_version(&self, current: Option<&str>) -> TrustResult<VersionCheck>;

    /// # Errors
    ///
    /// Returns [`crate::TrustError::Fetch`] when the download fails.
    async fn download(&self, progress: &dyn ProgressObserver) -> TrustResult<DownloadedData>;
}
