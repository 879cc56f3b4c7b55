//! Business rule evaluation for health certificates
//!
//! Provides:
//! - A CertLogic interpreter over JSON payloads ([`Logic`], [`interpreter`])
//! - A [`RuleEngine`] gating rules by dialect, engine version and schema
//!   version, producing one PASSED / FAILED / OPEN result per rule
//! - Rule selection by country, certificate type, validity and version
//! - A [`RulesValidator`] that pulls rule sets and value sets through
//!   freshness-managed trust-data caches
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use rules_engine::{CertificateType, ExternalParameter, RuleEngine, RuleEntry, Verdict};
//! use serde_json::json;
//!
//! let rule: RuleEntry = serde_json::from_value(json!({
//!     "Identifier": "VR-DE-0001",
//!     "Type": "Acceptance",
//!     "Country": "DE",
//!     "Version": "1.0.0",
//!     "SchemaVersion": "1.0.0",
//!     "Engine": "CERTLOGIC",
//!     "EngineVersion": "0.7.5",
//!     "CertificateType": "Vaccination",
//!     "ValidFrom": "2021-06-01T00:00:00Z",
//!     "ValidTo": "2030-06-01T00:00:00Z",
//!     "AffectedFields": ["v.0.dn", "v.0.sd"],
//!     "Logic": {">=": [{"var": "payload.v.0.dn"}, {"var": "payload.v.0.sd"}]}
//! }))
//! .unwrap();
//!
//! let now = Utc.with_ymd_and_hms(2021, 8, 1, 0, 0, 0).unwrap();
//! let external = ExternalParameter {
//!     validation_clock: now,
//!     value_sets: Default::default(),
//!     country_code: "DE".to_string(),
//!     exp: now,
//!     iat: now,
//!     issuer_country_code: "DE".to_string(),
//!     kid: None,
//!     region: None,
//! };
//!
//! let results = RuleEngine::new().validate(
//!     CertificateType::Vaccination,
//!     "1.3.0",
//!     &[rule],
//!     &external,
//!     &json!({"v": [{"dn": 2, "sd": 2}]}),
//! );
//! assert_eq!(results[0].result, Verdict::Passed);
//! ```

pub mod engine;
pub mod error;
pub mod interpreter;
pub mod logic;
pub mod model;
pub mod rule_set;
pub mod validator;
pub mod version;

pub use engine::{RuleEngine, CERTLOGIC_ENGINE, DEFAULT_MAX_ENGINE_VERSION};
pub use error::{Result, RuleEngineError};
pub use logic::{Comparison, DateComparison, Logic, TimeUnit};
pub use model::{
    AffectedField, CertificateType, CertificateVerdict, ExternalParameter, RuleDescription,
    RuleEntry, RuleType, ValidationResult, Verdict,
};
pub use rule_set::{rule_set_manager, rule_set_store_name, select_rules, RuleFilter, RuleSet};
pub use validator::{RulesValidationRequest, RulesValidator};
pub use version::parse_version;
