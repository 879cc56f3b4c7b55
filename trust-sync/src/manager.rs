//! Trust Data Manager
//!
//! Owns one cached trust-material instance and keeps it fresh according to
//! its [`FreshnessPolicy`]:
//!
//! 1. Past `max_file_age` (or nothing cached yet): wait for a refresh and
//!    surface its failure. Data this old is never served.
//! 2. Past `refresh_interval`, or a newer version advertised: start a
//!    refresh unless one was attempted within `min_refresh_interval`. Either
//!    serve cached data immediately (`use_available_while_refreshing`) or
//!    wait and fall back to cached data if the refresh fails.
//! 3. Answer the query from whatever is cached.
//!
//! Refreshes always go through the manager's [`SingleFlight`], so there is
//! never more than one fetch per instance. Dropping a query future abandons
//! only that caller's wait.

use chrono::{DateTime, Utc};
use error_common::{ErrorContext, ErrorReporter};
use logger_redacted::redact_identifier;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client::TrustDataClient;
use crate::clock::{Clock, SystemClock};
use crate::error::{TrustError, TrustResult};
use crate::material::{
    RevocationList, TrustAnchor, TrustAnchorList, TrustMaterial, ValueSetBundle,
};
use crate::policy::{Freshness, FreshnessPolicy};
use crate::progress::{NoopProgress, ProgressObserver};
use crate::single_flight::{FlightHandle, SingleFlight};
use crate::status::SyncStatus;
use crate::store::{StoredSnapshot, TrustDataStore};

struct CacheState<D> {
    status: SyncStatus,
    data: Option<Arc<D>>,
    /// Last read of the persisted copy while memory already held data
    last_local_reload: Option<DateTime<Utc>>,
}

struct ManagerInner<M: TrustMaterial> {
    policy: FreshnessPolicy,
    client: Arc<dyn TrustDataClient>,
    store: Arc<dyn TrustDataStore>,
    clock: Arc<dyn Clock>,
    progress: Arc<dyn ProgressObserver>,
    reporter: ErrorReporter,
    state: RwLock<CacheState<M::Data>>,
    flight: SingleFlight<SyncStatus>,
}

/// Cheap to clone; clones share the same cache and coordinator
pub struct TrustDataManager<M: TrustMaterial> {
    inner: Arc<ManagerInner<M>>,
}

impl<M: TrustMaterial> Clone for TrustDataManager<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct TrustDataManagerBuilder<M: TrustMaterial> {
    policy: FreshnessPolicy,
    client: Arc<dyn TrustDataClient>,
    store: Arc<dyn TrustDataStore>,
    clock: Arc<dyn Clock>,
    progress: Arc<dyn ProgressObserver>,
    _material: std::marker::PhantomData<M>,
}

impl<M: TrustMaterial> TrustDataManagerBuilder<M> {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] for an inconsistent policy.
    pub fn build(self) -> TrustResult<TrustDataManager<M>> {
        self.policy.validate()?;
        Ok(TrustDataManager {
            inner: Arc::new(ManagerInner {
                policy: self.policy,
                client: self.client,
                store: self.store,
                clock: self.clock,
                progress: self.progress,
                reporter: ErrorReporter::new(),
                state: RwLock::new(CacheState {
                    status: SyncStatus::default(),
                    data: None,
                    last_local_reload: None,
                }),
                flight: SingleFlight::new(),
            }),
        })
    }
}

impl<M: TrustMaterial> TrustDataManager<M> {
    pub fn builder(
        policy: FreshnessPolicy,
        client: Arc<dyn TrustDataClient>,
        store: Arc<dyn TrustDataStore>,
    ) -> TrustDataManagerBuilder<M> {
        TrustDataManagerBuilder {
            policy,
            client,
            store,
            clock: Arc::new(SystemClock),
            progress: Arc::new(NoopProgress),
            _material: std::marker::PhantomData,
        }
    }

    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] for an inconsistent policy.
    pub fn new(
        policy: FreshnessPolicy,
        client: Arc<dyn TrustDataClient>,
        store: Arc<dyn TrustDataStore>,
    ) -> TrustResult<Self> {
        Self::builder(policy, client, store).build()
    }

    pub fn kind(&self) -> &'static str {
        M::KIND
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.inner.policy
    }

    /// Current freshness snapshot. With `allow_local_reload`, a persisted
    /// copy newer than memory (written by another process) is adopted first.
    ///
    /// # Errors
    ///
    /// Store failures are logged and absorbed; this currently always
    /// succeeds but keeps a `Result` for stores that must surface errors.
    pub async fn get_sync_status(&self, allow_local_reload: bool) -> TrustResult<SyncStatus> {
        if allow_local_reload {
            self.inner.reload_from_store_if_newer().await;
        }
        Ok(self.inner.state.read().status.clone())
    }

    /// Run one fetch cycle (shared with any refresh already in flight).
    ///
    /// # Errors
    ///
    /// Returns the fetch, decode or storage error of the cycle. The previous
    /// cache stays authoritative.
    pub async fn update_from_server(&self) -> TrustResult<SyncStatus> {
        self.refresh().await
    }

    /// Application-facing alias of [`Self::update_from_server`]
    ///
    /// # Errors
    ///
    /// See [`Self::update_from_server`].
    pub async fn force_refresh(&self) -> TrustResult<SyncStatus> {
        self.update_from_server().await
    }

    /// Raw query primitive: whatever is cached, without freshness checks
    pub fn snapshot(&self) -> Option<Arc<M::Data>> {
        self.inner.state.read().data.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.flight.is_in_flight()
    }

    /// Apply the freshness policy and return the data queries should use.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::StaleBeyondLimit`] when cached data is past
    /// `max_file_age` and the refresh failed, or [`TrustError::NoTrustData`]
    /// when nothing was ever cached and the initial download failed.
    pub async fn ensure_fresh(&self) -> TrustResult<Arc<M::Data>> {
        let status = self.get_sync_status(true).await?;
        let now = self.inner.clock.now();

        match self.inner.policy.evaluate(&status, now) {
            Freshness::Fresh => {}
            Freshness::DueButThrottled => {
                debug!(
                    material = M::KIND,
                    last_attempt = ?status.last_attempt,
                    "Refresh due but last attempt too recent, using cached data"
                );
            }
            Freshness::Due => {
                let handle = self.refresh();
                if self.inner.policy.use_available_while_refreshing {
                    debug!(material = M::KIND, "Serving cached data while refreshing in background");
                } else if let Err(e) = handle.await {
                    warn!(
                        material = M::KIND,
                        error = %e,
                        "Refresh failed, falling back to cached data within max age"
                    );
                }
            }
            Freshness::Expired => {
                if let Err(e) = self.refresh().await {
                    return Err(self.expired_error(&status, &e));
                }
            }
        }

        self.snapshot().ok_or_else(|| TrustError::NoTrustData {
            kind: M::KIND,
            reason: "refresh completed without data".to_string(),
        })
    }

    /// Policy-governed lookup against the cached data
    ///
    /// # Errors
    ///
    /// See [`Self::ensure_fresh`].
    pub async fn query<R>(&self, lookup: impl FnOnce(&M::Data) -> R) -> TrustResult<R> {
        let data = self.ensure_fresh().await?;
        Ok(lookup(&data))
    }

    fn refresh(&self) -> FlightHandle<SyncStatus> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .flight
            .run_single(move || async move { inner.run_update().await })
    }

    fn expired_error(&self, status: &SyncStatus, cause: &TrustError) -> TrustError {
        match status.last_check {
            Some(last_check) if status.has_data() => TrustError::StaleBeyondLimit {
                kind: M::KIND,
                last_check,
                reason: cause.to_string(),
            },
            _ => TrustError::NoTrustData {
                kind: M::KIND,
                reason: cause.to_string(),
            },
        }
    }
}

impl<M: TrustMaterial> ManagerInner<M> {
    async fn run_update(&self) -> TrustResult<SyncStatus> {
        let started = Instant::now();
        let result = self.perform_update().await;
        match &result {
            Ok(status) => info!(
                material = M::KIND,
                version = ?status.current_version,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Trust data refresh completed"
            ),
            Err(e) => self.reporter.report(
                e,
                &ErrorContext::new()
                    .with_trust_material(M::KIND)
                    .add_context("elapsed_ms", started.elapsed().as_millis().to_string()),
            ),
        }
        result
    }

    async fn perform_update(&self) -> TrustResult<SyncStatus> {
        let attempted_at = self.clock.now();
        let (current_version, has_data) = {
            let mut state = self.state.write();
            state.status.last_attempt = Some(latest(state.status.last_attempt, attempted_at));
            (state.status.current_version.clone(), state.data.is_some())
        };

        debug!(material = M::KIND, current_version = ?current_version, "Checking for new trust data version");
        let check = self.client.check_version(current_version.as_deref()).await?;

        if has_data && !check.requires_download(current_version.as_deref()) {
            let now = self.clock.now();
            if let Err(e) = self.store.mark_checked(&check.version, now).await {
                warn!(material = M::KIND, error = %e, "Could not persist check time");
            }
            let mut state = self.state.write();
            state.status.last_check = Some(latest(state.status.last_check, now));
            state.status.pending_version = None;
            debug!(material = M::KIND, version = %check.version, "Trust data unchanged");
            return Ok(state.status.clone());
        }

        self.state.write().status.pending_version = Some(check.version.clone());
        info!(
            material = M::KIND,
            from = ?current_version,
            to = %check.version,
            "Downloading trust data"
        );

        let downloaded = self.client.download(self.progress.as_ref()).await?;
        let data = M::decode(&downloaded.payload)?;

        let now = self.clock.now();
        let snapshot = StoredSnapshot {
            version: downloaded.version,
            last_check: now,
            payload: downloaded.payload,
        };
        self.store.save(&snapshot).await?;

        let mut state = self.state.write();
        state.data = Some(Arc::new(data));
        state.status.last_check = Some(latest(state.status.last_check, now));
        state.status.pending_version = None;
        state.status.current_version = Some(snapshot.version);
        Ok(state.status.clone())
    }

    /// Adopt a persisted copy when memory is empty, or when the policy allows
    /// reloading and memory is no longer fresh. With data in memory the store
    /// is read at most once per `min_refresh_interval`.
    async fn reload_from_store_if_newer(&self) {
        let now = self.clock.now();
        let (status, has_data) = {
            let state = self.state.read();
            (state.status.clone(), state.data.is_some())
        };

        if has_data {
            let wanted = self.policy.try_reload_from_local_store_when_expired
                && self.policy.evaluate(&status, now) != Freshness::Fresh;
            if !wanted {
                return;
            }
            let mut state = self.state.write();
            if !self.policy.local_reload_allowed(state.last_local_reload, now) {
                return;
            }
            state.last_local_reload = Some(now);
        }

        let stored = match self.store.load().await {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                warn!(material = M::KIND, error = %e, "Could not read persisted trust data");
                return;
            }
        };

        let newer = !has_data
            || status
                .last_check
                .map_or(true, |last_check| stored.last_check > last_check);
        if !newer {
            return;
        }

        let data = match M::decode(&stored.payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(material = M::KIND, error = %e, "Ignoring undecodable persisted trust data");
                return;
            }
        };

        let mut state = self.state.write();
        // A refresh may have completed while the store was being read
        if state
            .status
            .last_check
            .is_some_and(|last_check| last_check >= stored.last_check && state.data.is_some())
        {
            return;
        }
        info!(
            material = M::KIND,
            version = %stored.version,
            last_check = %stored.last_check,
            "Loaded trust data from local store"
        );
        if state.status.pending_version.as_deref() == Some(stored.version.as_str()) {
            state.status.pending_version = None;
        }
        state.status.last_check = Some(latest(state.status.last_check, stored.last_check));
        state.status.current_version = Some(stored.version);
        state.data = Some(Arc::new(data));
    }
}

fn latest(previous: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(candidate, |previous| previous.max(candidate))
}

// =============================================================================
// Typed entry points
// =============================================================================

impl TrustDataManager<RevocationList> {
    /// # Errors
    ///
    /// Fails instead of answering `false` when no trustworthy list is
    /// available; see [`Self::ensure_fresh`].
    pub async fn is_listed(&self, identifier: &str) -> TrustResult<bool> {
        let listed = self.query(|entries| entries.contains(identifier)).await?;
        debug!(
            identifier = %redact_identifier(identifier),
            listed,
            "Revocation lookup"
        );
        Ok(listed)
    }

    /// # Errors
    ///
    /// See [`Self::is_listed`].
    pub async fn is_blacklisted(&self, identifier: &str) -> TrustResult<bool> {
        self.is_listed(identifier).await
    }
}

impl TrustDataManager<TrustAnchorList> {
    /// # Errors
    ///
    /// See [`Self::ensure_fresh`].
    pub async fn find_anchor(&self, kid: &str) -> TrustResult<Vec<TrustAnchor>> {
        let anchors = self.query(|anchors| anchors.find(kid).to_vec()).await?;
        debug!(kid = %redact_identifier(kid), matches = anchors.len(), "Trust anchor lookup");
        Ok(anchors)
    }
}

impl TrustDataManager<ValueSetBundle> {
    /// Codes of one value set, sorted
    ///
    /// # Errors
    ///
    /// See [`Self::ensure_fresh`].
    pub async fn get_value_set(&self, name: &str) -> TrustResult<Option<Vec<String>>> {
        self.query(|sets| {
            sets.get(name).map(|codes| {
                let mut codes: Vec<String> = codes.iter().cloned().collect();
                codes.sort();
                codes
            })
        })
        .await
    }

    /// # Errors
    ///
    /// See [`Self::ensure_fresh`].
    pub async fn value_set_map(
        &self,
    ) -> TrustResult<std::collections::HashMap<String, Vec<String>>> {
        self.query(|sets| sets.as_map()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DownloadedData, VersionCheck};
    use crate::clock::ManualClock;
    use crate::material::hash_identifier;
    use crate::store::InMemoryTrustDataStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClient {
        version: Mutex<String>,
        payload: Mutex<Vec<u8>>,
        fail: Mutex<bool>,
        checks: AtomicUsize,
        downloads: AtomicUsize,
    }

    impl StubClient {
        fn new(version: &str, revoked: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                version: Mutex::new(version.to_string()),
                payload: Mutex::new(revocation_payload(revoked)),
                fail: Mutex::new(false),
                checks: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
            })
        }

        fn publish(&self, version: &str, revoked: &[&str]) {
            *self.version.lock() = version.to_string();
            *self.payload.lock() = revocation_payload(revoked);
        }

        fn set_failing(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TrustDataClient for StubClient {
        async fn check_version(&self, _current: Option<&str>) -> TrustResult<VersionCheck> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock() {
                return Err(TrustError::Fetch("authority unreachable".to_string()));
            }
            Ok(VersionCheck {
                version: self.version.lock().clone(),
                newer_available: false,
            })
        }

        async fn download(&self, _progress: &dyn ProgressObserver) -> TrustResult<DownloadedData> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(DownloadedData {
                version: self.version.lock().clone(),
                payload: self.payload.lock().clone(),
            })
        }
    }

    fn revocation_payload(revoked: &[&str]) -> Vec<u8> {
        let hashes: Vec<String> = revoked.iter().map(|id| hash_identifier(id)).collect();
        serde_json::to_vec(&hashes).unwrap()
    }

    fn policy(use_available: bool) -> FreshnessPolicy {
        FreshnessPolicy {
            refresh_interval: std::time::Duration::from_secs(3600),
            min_refresh_interval: std::time::Duration::from_secs(60),
            max_file_age: std::time::Duration::from_secs(86_400),
            use_available_while_refreshing: use_available,
            try_reload_from_local_store_when_expired: true,
        }
    }

    fn manager(
        client: Arc<StubClient>,
        store: Arc<InMemoryTrustDataStore>,
        clock: Arc<ManualClock>,
        use_available: bool,
    ) -> TrustDataManager<RevocationList> {
        TrustDataManager::builder(policy(use_available), client, store)
            .clock(clock)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_use_downloads_synchronously() {
        let client = StubClient::new("v1", &["URN:UVCI:01:DE:A"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock, true);

        assert!(mgr.is_listed("URN:UVCI:01:DE:A").await.unwrap());
        assert!(!mgr.is_listed("URN:UVCI:01:DE:B").await.unwrap());
        assert_eq!(client.downloads(), 1);

        let status = mgr.get_sync_status(false).await.unwrap();
        assert_eq!(status.current_version.as_deref(), Some("v1"));
        assert!(!status.has_pending_download());
    }

    #[tokio::test]
    async fn test_first_use_failure_is_surfaced() {
        let client = StubClient::new("v1", &[]);
        client.set_failing(true);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client, Arc::new(InMemoryTrustDataStore::new()), clock, true);

        let err = mgr.is_listed("anything").await.unwrap_err();
        assert!(matches!(err, TrustError::NoTrustData { kind: "revocation-list", .. }));
    }

    #[tokio::test]
    async fn test_fresh_data_causes_no_traffic() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock.clone(), true);

        mgr.is_listed("x").await.unwrap();
        clock.advance(Duration::minutes(30));
        for _ in 0..5 {
            mgr.is_listed("x").await.unwrap();
        }
        assert_eq!(client.checks(), 1);
        assert_eq!(client.downloads(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_version_skips_download() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryTrustDataStore::new());
        let mgr = manager(client.clone(), store.clone(), clock.clone(), false);

        mgr.is_listed("x").await.unwrap();
        let first = mgr.get_sync_status(false).await.unwrap().last_check.unwrap();

        clock.advance(Duration::hours(2));
        mgr.is_listed("x").await.unwrap();
        let second = mgr.get_sync_status(false).await.unwrap().last_check.unwrap();

        assert_eq!(client.checks(), 2);
        assert_eq!(client.downloads(), 1);
        assert!(second > first);
        assert_eq!(store.current().unwrap().last_check, second);
    }

    #[tokio::test]
    async fn test_blocking_refresh_picks_up_new_version() {
        let client = StubClient::new("v1", &[]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock.clone(), false);

        assert!(!mgr.is_listed("late").await.unwrap());
        client.publish("v2", &["late"]);
        clock.advance(Duration::hours(2));

        assert!(mgr.is_listed("late").await.unwrap());
        assert_eq!(
            mgr.get_sync_status(false).await.unwrap().current_version.as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_blocking_refresh_failure_falls_back_within_max_age() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock.clone(), false);

        mgr.is_listed("x").await.unwrap();
        client.set_failing(true);
        clock.advance(Duration::hours(2));

        assert!(mgr.is_listed("x").await.unwrap());
        assert_eq!(client.checks(), 2);
    }

    #[tokio::test]
    async fn test_min_refresh_interval_throttles_attempts() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock.clone(), false);

        mgr.is_listed("x").await.unwrap();
        client.set_failing(true);
        clock.advance(Duration::hours(2));
        mgr.is_listed("x").await.unwrap();

        // Within min_refresh_interval of the failed attempt: no new attempt
        clock.advance(Duration::seconds(30));
        mgr.is_listed("x").await.unwrap();
        assert_eq!(client.checks(), 2);

        clock.advance(Duration::seconds(60));
        mgr.is_listed("x").await.unwrap();
        assert_eq!(client.checks(), 3);
    }

    #[tokio::test]
    async fn test_expired_data_with_failed_refresh_is_rejected() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mgr = manager(client.clone(), Arc::new(InMemoryTrustDataStore::new()), clock.clone(), true);

        mgr.is_listed("x").await.unwrap();
        client.set_failing(true);
        clock.advance(Duration::days(2));

        let err = mgr.is_listed("x").await.unwrap_err();
        assert!(matches!(err, TrustError::StaleBeyondLimit { .. }));
    }

    #[tokio::test]
    async fn test_failed_download_keeps_previous_cache() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryTrustDataStore::new());
        let mgr = manager(client.clone(), store.clone(), clock.clone(), false);

        mgr.is_listed("x").await.unwrap();
        // Authority publishes a corrupt payload under a new version
        *client.version.lock() = "v2".to_string();
        *client.payload.lock() = b"garbage".to_vec();

        let err = mgr.update_from_server().await.unwrap_err();
        assert!(matches!(err, TrustError::Decode { .. }));

        let status = mgr.get_sync_status(false).await.unwrap();
        assert_eq!(status.current_version.as_deref(), Some("v1"));
        assert!(status.has_pending_download());
        assert_eq!(store.current().unwrap().version, "v1");
        assert!(mgr.snapshot().unwrap().contains("x"));
    }

    #[tokio::test]
    async fn test_reload_from_local_store_before_fetch() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryTrustDataStore::new());
        let mgr = manager(client.clone(), store.clone(), clock.clone(), false);

        mgr.is_listed("x").await.unwrap();
        clock.advance(Duration::hours(2));

        // Another process refreshed the shared cache in the meantime
        store.replace(StoredSnapshot {
            version: "v2".to_string(),
            last_check: clock.now(),
            payload: revocation_payload(&["y"]),
        });

        assert!(mgr.is_listed("y").await.unwrap());
        assert_eq!(client.checks(), 1);
    }

    /// Counts reads so tests can see how often the persisted copy is parsed
    struct CountingStore {
        inner: InMemoryTrustDataStore,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl TrustDataStore for CountingStore {
        async fn load(&self) -> TrustResult<Option<StoredSnapshot>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load().await
        }

        async fn save(&self, snapshot: &StoredSnapshot) -> TrustResult<()> {
            self.inner.save(snapshot).await
        }

        async fn mark_checked(&self, version: &str, last_check: DateTime<Utc>) -> TrustResult<()> {
            self.inner.mark_checked(version, last_check).await
        }
    }

    #[tokio::test]
    async fn test_local_reloads_are_rate_limited_while_authority_is_down() {
        let client = StubClient::new("v1", &["x"]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(CountingStore {
            inner: InMemoryTrustDataStore::new(),
            loads: AtomicUsize::new(0),
        });
        let mgr: TrustDataManager<RevocationList> =
            TrustDataManager::builder(policy(false), client.clone(), store.clone())
                .clock(clock.clone())
                .build()
                .unwrap();

        // Empty memory always consults the store
        mgr.is_listed("x").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        client.set_failing(true);
        clock.advance(Duration::hours(2));
        mgr.is_listed("x").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        for _ in 0..20 {
            clock.advance(Duration::seconds(1));
            assert!(mgr.is_listed("x").await.unwrap());
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        clock.advance(Duration::seconds(61));
        mgr.is_listed("x").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persisted_copy_used_on_startup() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryTrustDataStore::with_snapshot(StoredSnapshot {
            version: "v7".to_string(),
            last_check: clock.now() - Duration::minutes(5),
            payload: revocation_payload(&["stored"]),
        }));
        let client = StubClient::new("v7", &[]);
        let mgr = manager(client.clone(), store, clock, true);

        assert!(mgr.is_listed("stored").await.unwrap());
        assert_eq!(client.checks(), 0);
    }

    #[tokio::test]
    async fn test_value_set_entry_points() {
        struct ValueSetClient;

        #[async_trait]
        impl TrustDataClient for ValueSetClient {
            async fn check_version(&self, _current: Option<&str>) -> TrustResult<VersionCheck> {
                Ok(VersionCheck {
                    version: "vs1".to_string(),
                    newer_available: false,
                })
            }

            async fn download(&self, _progress: &dyn ProgressObserver) -> TrustResult<DownloadedData> {
                Ok(DownloadedData {
                    version: "vs1".to_string(),
                    payload: br#"{"vaccines-covid-19-names":["EU/1/20/1528","EU/1/20/1507"]}"#.to_vec(),
                })
            }
        }

        let mgr: TrustDataManager<ValueSetBundle> = TrustDataManager::new(
            FreshnessPolicy::value_sets(),
            Arc::new(ValueSetClient),
            Arc::new(InMemoryTrustDataStore::new()),
        )
        .unwrap();

        assert_eq!(
            mgr.get_value_set("vaccines-covid-19-names").await.unwrap(),
            Some(vec!["EU/1/20/1507".to_string(), "EU/1/20/1528".to_string()])
        );
        assert_eq!(mgr.get_value_set("unknown").await.unwrap(), None);
        assert_eq!(mgr.value_set_map().await.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut bad = policy(true);
        bad.min_refresh_interval = std::time::Duration::from_secs(7200);
        let result: TrustResult<TrustDataManager<RevocationList>> = TrustDataManager::new(
            bad,
            StubClient::new("v1", &[]),
            Arc::new(InMemoryTrustDataStore::new()),
        );
        assert!(matches!(result, Err(TrustError::Configuration(_))));
    }
}
