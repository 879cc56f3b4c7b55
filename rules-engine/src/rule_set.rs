//! Rule sets as synchronised trust material, and rule selection
//!
//! Each country publishes its rules as one JSON array; the payload is kept
//! under the same freshness policy as every other trust material.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use trust_sync::{TrustDataManager, TrustError, TrustMaterial, TrustResult, TrustSyncConfig};

use crate::model::{CertificateType, RuleEntry, RuleType};
use crate::version::parse_version;

pub struct RuleSet;

impl TrustMaterial for RuleSet {
    const KIND: &'static str = "rule-set";
    type Data = Vec<RuleEntry>;

    fn decode(payload: &[u8]) -> TrustResult<Self::Data> {
        serde_json::from_slice(payload).map_err(|e| TrustError::decode(Self::KIND, e))
    }
}

/// Store name for one country's rule set, e.g. `rule-set-de`
pub fn rule_set_store_name(country: &str) -> String {
    format!("{}-{}", RuleSet::KIND, country.trim().to_ascii_lowercase())
}

/// Manager for one country's rules, fetched and cached under
/// [`rule_set_store_name`] with the configured rule-set policy
///
/// # Errors
///
/// See [`TrustSyncConfig::manager`].
pub fn rule_set_manager(
    config: &TrustSyncConfig,
    country: &str,
) -> TrustResult<TrustDataManager<RuleSet>> {
    config.manager(&config.rule_sets, &rule_set_store_name(country))
}

/// Criteria a rule must meet to be applied to a certificate
#[derive(Debug, Clone)]
pub struct RuleFilter<'a> {
    pub certificate_type: CertificateType,
    pub rule_type: RuleType,
    pub country: &'a str,
    pub region: Option<&'a str>,
    pub validation_clock: DateTime<Utc>,
}

impl RuleFilter<'_> {
    fn accepts(&self, rule: &RuleEntry) -> bool {
        rule.rule_type == self.rule_type
            && rule.country.eq_ignore_ascii_case(self.country)
            && rule.certificate_type.applies_to(self.certificate_type)
            && rule.is_valid_at(self.validation_clock)
            && match (&rule.region, self.region) {
                (None, _) => true,
                (Some(required), Some(region)) => required.eq_ignore_ascii_case(region),
                (Some(_), None) => false,
            }
    }
}

/// Rules applicable under `filter`, keeping only the highest version of
/// each identifier. Output is sorted by identifier.
pub fn select_rules(rules: &[RuleEntry], filter: &RuleFilter<'_>) -> Vec<RuleEntry> {
    let mut latest: HashMap<&str, &RuleEntry> = HashMap::new();
    for rule in rules.iter().filter(|rule| filter.accepts(rule)) {
        let newer = latest
            .get(rule.identifier.as_str())
            .map_or(true, |current| {
                parse_version(&rule.version) > parse_version(&current.version)
            });
        if newer {
            latest.insert(&rule.identifier, rule);
        }
    }

    let mut selected: Vec<RuleEntry> = latest.into_values().cloned().collect();
    selected.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    selected
}
