//! Freshness policy: when cached trust material may be used as-is, when a
//! refresh is due, and when it is too old to trust at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TrustError, TrustResult};
use crate::status::SyncStatus;

/// Per trust-material class policy, immutable after construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    /// Normal re-check cadence (seconds when serialized)
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,
    /// Minimum spacing between refresh attempts, successful or not
    #[serde(with = "duration_secs")]
    pub min_refresh_interval: Duration,
    /// Absolute ceiling past which cached data is never served
    #[serde(with = "duration_secs")]
    pub max_file_age: Duration,
    /// Serve stale-but-not-expired data while a refresh runs in the background
    pub use_available_while_refreshing: bool,
    /// Pick up out-of-process updates to the persisted cache before fetching
    pub try_reload_from_local_store_when_expired: bool,
}

// Serialize Duration as seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Outcome of applying the policy to a status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the refresh interval and nothing newer advertised
    Fresh,
    /// A refresh is due and may be started now
    Due,
    /// A refresh is due but the last attempt was too recent
    DueButThrottled,
    /// Past `max_file_age` or no data at all; callers must wait for a refresh
    Expired,
}

impl FreshnessPolicy {
    pub fn trust_anchors() -> Self {
        Self::daily()
    }

    pub fn rule_set() -> Self {
        Self::daily()
    }

    pub fn value_sets() -> Self {
        Self::daily()
    }

    pub fn revocation_list() -> Self {
        Self {
            refresh_interval: Duration::from_secs(HOUR),
            min_refresh_interval: Duration::from_secs(MINUTE),
            max_file_age: Duration::from_secs(2 * DAY),
            use_available_while_refreshing: true,
            try_reload_from_local_store_when_expired: true,
        }
    }

    fn daily() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DAY),
            min_refresh_interval: Duration::from_secs(MINUTE),
            max_file_age: Duration::from_secs(14 * DAY),
            use_available_while_refreshing: true,
            try_reload_from_local_store_when_expired: true,
        }
    }

    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] when the intervals are not
    /// ordered `min_refresh_interval <= refresh_interval <= max_file_age`.
    pub fn validate(&self) -> TrustResult<()> {
        if self.max_file_age.is_zero() {
            return Err(TrustError::Configuration(
                "max_file_age must be greater than zero".to_string(),
            ));
        }
        if self.min_refresh_interval > self.refresh_interval {
            return Err(TrustError::Configuration(format!(
                "min_refresh_interval ({}s) exceeds refresh_interval ({}s)",
                self.min_refresh_interval.as_secs(),
                self.refresh_interval.as_secs()
            )));
        }
        if self.refresh_interval > self.max_file_age {
            return Err(TrustError::Configuration(format!(
                "refresh_interval ({}s) exceeds max_file_age ({}s)",
                self.refresh_interval.as_secs(),
                self.max_file_age.as_secs()
            )));
        }
        Ok(())
    }

    pub fn is_expired(&self, status: &SyncStatus, now: DateTime<Utc>) -> bool {
        match status.last_check {
            Some(last_check) if status.has_data() => elapsed(last_check, self.max_file_age, now),
            _ => true,
        }
    }

    pub fn evaluate(&self, status: &SyncStatus, now: DateTime<Utc>) -> Freshness {
        if self.is_expired(status, now) {
            return Freshness::Expired;
        }

        let due = status.has_pending_download()
            || status
                .last_check
                .map_or(true, |last_check| elapsed(last_check, self.refresh_interval, now));
        if !due {
            return Freshness::Fresh;
        }

        let throttled = status
            .last_attempt
            .is_some_and(|attempt| !elapsed(attempt, self.min_refresh_interval, now));
        if throttled {
            Freshness::DueButThrottled
        } else {
            Freshness::Due
        }
    }

    /// Re-reads of the persisted copy are spaced like refresh attempts
    pub fn local_reload_allowed(
        &self,
        last_reload: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        last_reload.map_or(true, |last| elapsed(last, self.min_refresh_interval, now))
    }
}

/// `since + interval < now`, saturating instead of overflowing
fn elapsed(since: DateTime<Utc>, interval: Duration, now: DateTime<Utc>) -> bool {
    let Ok(interval) = chrono::Duration::from_std(interval) else {
        return false;
    };
    since
        .checked_add_signed(interval)
        .is_some_and(|deadline| deadline < now)
}
