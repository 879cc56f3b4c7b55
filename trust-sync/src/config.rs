//! Layered configuration for the trust-sync subsystem
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in class defaults
//! 2. Optional configuration file (YAML, TOML or JSON by extension)
//! 3. `TRUST_SYNC__*` environment variables, e.g.
//!    `TRUST_SYNC__REVOCATION_LIST__REFRESH_INTERVAL=1800`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{TrustError, TrustResult};
use crate::http_client::HttpTrustDataClient;
use crate::manager::TrustDataManager;
use crate::material::{RevocationList, TrustAnchorList, TrustMaterial, ValueSetBundle};
use crate::policy::{duration_secs, FreshnessPolicy};
use crate::progress::TracingProgress;
use crate::store::FileTrustDataStore;

pub const ENV_PREFIX: &str = "TRUST_SYNC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSyncConfig {
    /// Base URL of the trust data authority
    pub server_url: String,
    /// Directory holding the persisted copies
    pub cache_dir: PathBuf,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub trust_anchors: FreshnessPolicy,
    pub revocation_list: FreshnessPolicy,
    pub rule_sets: FreshnessPolicy,
    pub value_sets: FreshnessPolicy,
}

impl Default for TrustSyncConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/api/v1/trust".to_string(),
            cache_dir: PathBuf::from("./trust-cache"),
            request_timeout: Duration::from_secs(30),
            trust_anchors: FreshnessPolicy::trust_anchors(),
            revocation_list: FreshnessPolicy::revocation_list(),
            rule_sets: FreshnessPolicy::rule_set(),
            value_sets: FreshnessPolicy::value_sets(),
        }
    }
}

impl TrustSyncConfig {
    /// Load defaults, then the optional file, then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] for unreadable sources or
    /// inconsistent policies.
    pub fn load(file: Option<&Path>) -> TrustResult<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] naming the offending class.
    pub fn validate(&self) -> TrustResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(TrustError::Configuration("server_url must not be empty".to_string()));
        }
        for (name, policy) in [
            ("trust_anchors", &self.trust_anchors),
            ("revocation_list", &self.revocation_list),
            ("rule_sets", &self.rule_sets),
            ("value_sets", &self.value_sets),
        ] {
            policy
                .validate()
                .map_err(|e| TrustError::Configuration(format!("{}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Client for `{server_url}/{path}`, bounded by `request_timeout`
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] if the HTTP client cannot be built.
    pub fn http_client(
        &self,
        path: &str,
        material: &'static str,
    ) -> TrustResult<HttpTrustDataClient> {
        HttpTrustDataClient::new(&self.server_url, path, material, self.request_timeout)
    }

    /// Store persisting to `{cache_dir}/{name}.json`
    pub fn file_store(&self, name: &str) -> FileTrustDataStore {
        FileTrustDataStore::new(&self.cache_dir, name)
    }

    /// Manager fetching from `{server_url}/{name}` and persisting under
    /// `cache_dir` with the same name. Progress is reported through tracing.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] for an inconsistent policy or an
    /// unbuildable HTTP client.
    pub fn manager<M: TrustMaterial>(
        &self,
        policy: &FreshnessPolicy,
        name: &str,
    ) -> TrustResult<TrustDataManager<M>> {
        let client = self.http_client(name, M::KIND)?;
        let store = self.file_store(name);
        TrustDataManager::builder(policy.clone(), Arc::new(client), Arc::new(store))
            .progress_observer(Arc::new(TracingProgress))
            .build()
    }

    /// # Errors
    ///
    /// See [`Self::manager`].
    pub fn revocation_manager(&self) -> TrustResult<TrustDataManager<RevocationList>> {
        self.manager(&self.revocation_list, RevocationList::KIND)
    }

    /// # Errors
    ///
    /// See [`Self::manager`].
    pub fn trust_anchor_manager(&self) -> TrustResult<TrustDataManager<TrustAnchorList>> {
        self.manager(&self.trust_anchors, TrustAnchorList::KIND)
    }

    /// # Errors
    ///
    /// See [`Self::manager`].
    pub fn value_set_manager(&self) -> TrustResult<TrustDataManager<ValueSetBundle>> {
        self.manager(&self.value_sets, ValueSetBundle::KIND)
    }
}
