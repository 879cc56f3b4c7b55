//! Per-country manager registry
//!
//! Rule sets are issued per country, each with its own freshness state and
//! refresh coordinator. Instances never share ordering or locks.

use dashmap::DashMap;
use std::sync::Arc;

use crate::client::TrustDataClient;
use crate::error::TrustResult;
use crate::manager::TrustDataManager;
use crate::material::TrustMaterial;
use crate::policy::FreshnessPolicy;
use crate::store::TrustDataStore;

pub struct ManagerRegistry<M: TrustMaterial> {
    managers: DashMap<String, TrustDataManager<M>>,
}

impl<M: TrustMaterial> Default for ManagerRegistry<M> {
    fn default() -> Self {
        Self {
            managers: DashMap::new(),
        }
    }
}

impl<M: TrustMaterial> ManagerRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the manager for a country code
    pub fn register(&self, country: &str, manager: TrustDataManager<M>) {
        self.managers.insert(normalize(country), manager);
    }

    /// Build and register a manager in one step
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrustError::Configuration`] for an inconsistent policy.
    pub fn register_new(
        &self,
        country: &str,
        policy: FreshnessPolicy,
        client: Arc<dyn TrustDataClient>,
        store: Arc<dyn TrustDataStore>,
    ) -> TrustResult<TrustDataManager<M>> {
        let manager = TrustDataManager::new(policy, client, store)?;
        self.register(country, manager.clone());
        Ok(manager)
    }

    pub fn get(&self, country: &str) -> Option<TrustDataManager<M>> {
        self.managers
            .get(&normalize(country))
            .map(|entry| entry.value().clone())
    }

    pub fn remove(&self, country: &str) -> Option<TrustDataManager<M>> {
        self.managers.remove(&normalize(country)).map(|(_, m)| m)
    }

    /// Registered country codes, sorted
    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.managers.iter().map(|e| e.key().clone()).collect();
        countries.sort();
        countries
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

fn normalize(country: &str) -> String {
    country.trim().to_ascii_uppercase()
}
