//! Rule evaluation entry point
//!
//! Every rule yields exactly one [`ValidationResult`], in input order.
//! Incompatible rules and rules that cannot be interpreted are reported as
//! OPEN; a single bad rule never aborts the batch.

use rayon::prelude::*;
use semver::Version;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, RuleEngineError};
use crate::interpreter::{evaluate, lookup};
use crate::logic::Logic;
use crate::model::{
    AffectedField, CertificateType, ExternalParameter, RuleEntry, ValidationResult, Verdict,
};
use crate::version::parse_version;

/// Logic dialect understood by this engine
pub const CERTLOGIC_ENGINE: &str = "CERTLOGIC";

/// Highest rule engine version accepted unless configured otherwise
pub const DEFAULT_MAX_ENGINE_VERSION: Version = Version::new(1, 0, 0);

#[derive(Debug, Clone)]
pub struct RuleEngine {
    engine: String,
    max_engine_version: Version,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            engine: CERTLOGIC_ENGINE.to_string(),
            max_engine_version: DEFAULT_MAX_ENGINE_VERSION,
        }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`RuleEngineError::InvalidEngineVersion`] when `version` is not a
    /// version number.
    pub fn with_max_engine_version(mut self, version: &str) -> Result<Self> {
        self.max_engine_version = parse_version(version)
            .ok_or_else(|| RuleEngineError::InvalidEngineVersion(version.to_string()))?;
        Ok(self)
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn max_engine_version(&self) -> &Version {
        &self.max_engine_version
    }

    /// Whether the rule is written in this engine's dialect at a supported
    /// engine version
    pub fn supports(&self, rule: &RuleEntry) -> bool {
        rule.engine.eq_ignore_ascii_case(&self.engine)
            && parse_version(&rule.engine_version)
                .map_or(false, |version| version <= self.max_engine_version)
    }

    /// The certificate must share the rule's schema major version and be
    /// at least as new as the schema the rule was written against
    fn schema_compatible(rule: &RuleEntry, certificate_schema: Option<&Version>) -> bool {
        match (certificate_schema, parse_version(&rule.schema_version)) {
            (Some(certificate), Some(rule_schema)) => {
                certificate.major == rule_schema.major && *certificate >= rule_schema
            }
            _ => false,
        }
    }

    /// Evaluate `rules` against one certificate payload
    ///
    /// Results hold their own copy of each rule and keep the input order.
    pub fn validate(
        &self,
        certificate_type: CertificateType,
        schema_version: &str,
        rules: &[RuleEntry],
        external: &ExternalParameter,
        payload: &Value,
    ) -> Vec<ValidationResult> {
        debug!(
            certificate_type = %certificate_type,
            schema_version,
            rules = rules.len(),
            "Validating certificate against rules"
        );

        let context = match build_context(external, payload) {
            Ok(context) => context,
            Err(err) => {
                warn!(error = %err, "Validation context could not be built");
                return rules
                    .iter()
                    .map(|rule| open(rule, payload, vec![err.to_string()]))
                    .collect();
            }
        };
        let certificate_schema = parse_version(schema_version);

        rules
            .par_iter()
            .map(|rule| self.evaluate_rule(rule, &context, payload, certificate_schema.as_ref()))
            .collect()
    }

    fn evaluate_rule(
        &self,
        rule: &RuleEntry,
        context: &Value,
        payload: &Value,
        certificate_schema: Option<&Version>,
    ) -> ValidationResult {
        if !self.supports(rule) || !Self::schema_compatible(rule, certificate_schema) {
            debug!(
                rule = %rule.identifier,
                engine = %rule.engine,
                engine_version = %rule.engine_version,
                schema_version = %rule.schema_version,
                "Rule not evaluable by this engine"
            );
            return open(rule, payload, Vec::new());
        }

        let outcome = Logic::parse(&rule.logic).and_then(|logic| evaluate(&logic, context));
        match outcome {
            Ok(Value::Bool(passed)) => {
                let result = if passed { Verdict::Passed } else { Verdict::Failed };
                debug!(rule = %rule.identifier, %result, "Rule evaluated");
                ValidationResult {
                    rule: rule.clone(),
                    result,
                    affected_fields: affected_fields(rule, payload),
                    errors: Vec::new(),
                }
            }
            Ok(other) => {
                let err = RuleEngineError::type_mismatch(
                    "rule",
                    format!("logic must produce a boolean, produced {}", other),
                );
                warn!(rule = %rule.identifier, error = %err, "Rule left open");
                open(rule, payload, vec![err.to_string()])
            }
            Err(err) => {
                warn!(rule = %rule.identifier, error = %err, "Rule left open");
                open(rule, payload, vec![err.to_string()])
            }
        }
    }
}

/// Data visible to rule logic: `payload` and `external`
fn build_context(external: &ExternalParameter, payload: &Value) -> Result<Value> {
    let mut context = Map::new();
    context.insert("payload".to_string(), payload.clone());
    context.insert("external".to_string(), serde_json::to_value(external)?);
    Ok(Value::Object(context))
}

fn open(rule: &RuleEntry, payload: &Value, errors: Vec<String>) -> ValidationResult {
    ValidationResult {
        rule: rule.clone(),
        result: Verdict::Open,
        affected_fields: affected_fields(rule, payload),
        errors,
    }
}

/// Affected field paths are relative to the payload; a leading
/// `payload.` is tolerated
fn affected_fields(rule: &RuleEntry, payload: &Value) -> Vec<AffectedField> {
    rule.affected_fields
        .iter()
        .map(|field| {
            let path = field.strip_prefix("payload.").unwrap_or(field);
            AffectedField {
                field: field.clone(),
                value: lookup(payload, path).cloned().unwrap_or(Value::Null),
            }
        })
        .collect()
}
