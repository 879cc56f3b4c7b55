//! Rule, context and result types
//!
//! Field names follow the CertLogic rule distribution format so rule sets
//! downloaded from an authority deserialize without a mapping layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// Issued by the country accepting the certificate
    Acceptance,
    /// Issued by the country that issued the certificate
    Invalidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    Vaccination,
    Recovery,
    Test,
    /// Applies to every certificate type
    General,
}

impl CertificateType {
    /// Whether a rule declared for `self` applies to a certificate of `certificate`
    pub fn applies_to(self, certificate: CertificateType) -> bool {
        self == CertificateType::General || self == certificate
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CertificateType::Vaccination => "Vaccination",
            CertificateType::Recovery => "Recovery",
            CertificateType::Test => "Test",
            CertificateType::General => "General",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescription {
    pub lang: String,
    pub desc: String,
}

/// A declarative business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleEntry {
    pub identifier: String,
    #[serde(rename = "Type")]
    pub rule_type: RuleType,
    /// Issuing country, ISO 3166 alpha-2
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub version: String,
    pub schema_version: String,
    /// Logic dialect name, e.g. `CERTLOGIC`
    pub engine: String,
    pub engine_version: String,
    pub certificate_type: CertificateType,
    #[serde(default)]
    pub description: Vec<RuleDescription>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// Payload paths reported back with the result, e.g. `v.0.dt`
    #[serde(default)]
    pub affected_fields: Vec<String>,
    pub logic: Value,
}

impl RuleEntry {
    /// Description in the requested language, falling back to English and
    /// then to the first one available
    pub fn description_for(&self, lang: &str) -> Option<&str> {
        self.description
            .iter()
            .find(|d| d.lang.eq_ignore_ascii_case(lang))
            .or_else(|| self.description.iter().find(|d| d.lang.eq_ignore_ascii_case("en")))
            .or_else(|| self.description.first())
            .map(|d| d.desc.as_str())
    }

    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.valid_from <= instant && instant <= self.valid_to
    }
}

/// Validation-time facts made available to rules under `external`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalParameter {
    pub validation_clock: DateTime<Utc>,
    /// Value-set name to allowed codes
    #[serde(default)]
    pub value_sets: HashMap<String, Vec<String>>,
    /// Country whose acceptance rules are applied
    pub country_code: String,
    pub exp: DateTime<Utc>,
    pub iat: DateTime<Utc>,
    pub issuer_country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Passed,
    Failed,
    /// The rule could not be judged
    Open,
}

impl Verdict {
    /// Combine per-rule verdicts into one certificate verdict: any FAILED
    /// wins, then any OPEN. No rules at all means nothing blocked the
    /// certificate.
    pub fn aggregate<'a, I>(verdicts: I) -> Verdict
    where
        I: IntoIterator<Item = &'a Verdict>,
    {
        verdicts.into_iter().fold(Verdict::Passed, |acc, v| match (acc, v) {
            (Verdict::Failed, _) | (_, Verdict::Failed) => Verdict::Failed,
            (Verdict::Open, _) | (_, Verdict::Open) => Verdict::Open,
            _ => Verdict::Passed,
        })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Passed => "PASSED",
            Verdict::Failed => "FAILED",
            Verdict::Open => "OPEN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedField {
    pub field: String,
    /// `null` when the path is absent from the payload
    pub value: Value,
}

/// Outcome of one rule. Owns a copy of the rule, so later changes to the
/// caller's rule list never show up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub rule: RuleEntry,
    pub result: Verdict,
    pub affected_fields: Vec<AffectedField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-rule results plus their aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateVerdict {
    pub verdict: Verdict,
    pub results: Vec<ValidationResult>,
}

impl CertificateVerdict {
    pub fn aggregate(results: &[ValidationResult]) -> Verdict {
        Verdict::aggregate(results.iter().map(|r| &r.result))
    }

    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let verdict = Self::aggregate(&results);
        Self { verdict, results }
    }

    pub fn failed_rules(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.result == Verdict::Failed)
    }

    pub fn open_rules(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.result == Verdict::Open)
    }
}
