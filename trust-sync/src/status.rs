//! Freshness snapshot of one cached trust-material instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only copy of a manager's freshness state. Handed out by value; the
/// manager never exposes its own instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Version of the cached data, `None` before the first download
    pub current_version: Option<String>,
    /// Most recent completed synchronisation with the remote authority
    pub last_check: Option<DateTime<Utc>>,
    /// Most recent refresh attempt, successful or not
    pub last_attempt: Option<DateTime<Utc>>,
    /// Newer version advertised by the authority but not yet downloaded
    pub pending_version: Option<String>,
}

impl SyncStatus {
    pub fn has_data(&self) -> bool {
        self.current_version.is_some()
    }

    pub fn has_pending_download(&self) -> bool {
        match (&self.pending_version, &self.current_version) {
            (Some(pending), Some(current)) => pending != current,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
