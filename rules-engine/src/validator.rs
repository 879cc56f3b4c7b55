//! Certificate validation against synchronised rule sets
//!
//! Resolves the acceptance country's rule set and the issuing country's
//! invalidation rules through their freshness-managed caches, then hands
//! the selection to the [`RuleEngine`].

use chrono::{DateTime, Utc};
use error_common::{CodedError, ErrorContext, ErrorReporter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use trust_sync::{
    Clock, ManagerRegistry, SystemClock, TrustDataManager, TrustMaterial, ValueSetBundle,
};

use crate::engine::RuleEngine;
use crate::error::{Result, RuleEngineError};
use crate::model::{
    CertificateType, CertificateVerdict, ExternalParameter, RuleEntry, RuleType, ValidationResult,
};
use crate::rule_set::{select_rules, RuleFilter, RuleSet};

/// Everything known about a certificate that rules may inspect
#[derive(Debug, Clone)]
pub struct RulesValidationRequest {
    pub certificate_type: CertificateType,
    pub schema_version: String,
    /// Decoded certificate payload, exposed to rules as `payload`
    pub payload: Value,
    /// Country whose acceptance rules apply
    pub country_code: String,
    pub region: Option<String>,
    pub issuer_country_code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub kid: Option<String>,
    /// Defaults to the validator's clock
    pub validation_clock: Option<DateTime<Utc>>,
}

pub struct RulesValidator {
    rule_sets: Arc<ManagerRegistry<RuleSet>>,
    value_sets: Option<TrustDataManager<ValueSetBundle>>,
    engine: Arc<RuleEngine>,
    clock: Arc<dyn Clock>,
    reporter: ErrorReporter,
}

impl RulesValidator {
    pub fn new(rule_sets: Arc<ManagerRegistry<RuleSet>>, engine: RuleEngine) -> Self {
        Self {
            rule_sets,
            value_sets: None,
            engine: Arc::new(engine),
            clock: Arc::new(SystemClock),
            reporter: ErrorReporter::new(),
        }
    }

    /// Expose value sets to rules under `external.valueSets`
    pub fn with_value_sets(mut self, value_sets: TrustDataManager<ValueSetBundle>) -> Self {
        self.value_sets = Some(value_sets);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// # Errors
    ///
    /// - [`RuleEngineError::UnsupportedCountry`] when no rule set is
    ///   registered for the acceptance country
    /// - [`RuleEngineError::TrustData`] when a rule set or the value sets
    ///   cannot be provided within their freshness policy
    /// - [`RuleEngineError::UnsupportedEngine`] when rules apply but none is
    ///   written for this engine
    pub async fn validate(&self, request: &RulesValidationRequest) -> Result<CertificateVerdict> {
        let result = self.validate_inner(request).await;
        if let Err(err) = &result {
            let context = ErrorContext::new()
                .with_trust_material(RuleSet::KIND)
                .with_country(request.country_code.clone());
            self.reporter.report(err as &dyn CodedError, &context);
        }
        result
    }

    async fn validate_inner(&self, request: &RulesValidationRequest) -> Result<CertificateVerdict> {
        let country = request.country_code.trim();
        let validation_clock = request
            .validation_clock
            .unwrap_or_else(|| self.clock.now());

        let manager = self
            .rule_sets
            .get(country)
            .ok_or_else(|| RuleEngineError::UnsupportedCountry(country.to_string()))?;
        let acceptance = manager.ensure_fresh().await?;
        let mut selected = select_rules(
            &acceptance,
            &RuleFilter {
                certificate_type: request.certificate_type,
                rule_type: RuleType::Acceptance,
                country,
                region: request.region.as_deref(),
                validation_clock,
            },
        );

        // Invalidation rules come from the issuer, when it publishes any
        let issuer = request.issuer_country_code.trim();
        if let Some(issuer_manager) = self.rule_sets.get(issuer) {
            let issuer_rules = issuer_manager.ensure_fresh().await?;
            selected.extend(select_rules(
                &issuer_rules,
                &RuleFilter {
                    certificate_type: request.certificate_type,
                    rule_type: RuleType::Invalidation,
                    country: issuer,
                    region: None,
                    validation_clock,
                },
            ));
        }

        if !selected.is_empty() && !selected.iter().any(|rule| self.engine.supports(rule)) {
            return Err(RuleEngineError::UnsupportedEngine {
                country: country.to_string(),
                engine: self.engine.engine().to_string(),
                max_version: self.engine.max_engine_version().to_string(),
            });
        }

        let value_sets = match &self.value_sets {
            Some(manager) => manager.value_set_map().await?,
            None => HashMap::new(),
        };
        let external = ExternalParameter {
            validation_clock,
            value_sets,
            country_code: country.to_string(),
            exp: request.expires_at,
            iat: request.issued_at,
            issuer_country_code: issuer.to_string(),
            kid: request.kid.clone(),
            region: request.region.clone(),
        };

        debug!(
            country,
            issuer,
            rules = selected.len(),
            "Evaluating selected rules"
        );
        let results = self
            .evaluate(
                request.certificate_type,
                &request.schema_version,
                selected,
                external,
                request.payload.clone(),
            )
            .await?;

        let verdict = CertificateVerdict::from_results(results);
        info!(
            country,
            certificate_type = %request.certificate_type,
            verdict = %verdict.verdict,
            rules = verdict.results.len(),
            "Certificate rules validated"
        );
        Ok(verdict)
    }

    /// Rule evaluation is CPU bound, so it runs off the async workers
    async fn evaluate(
        &self,
        certificate_type: CertificateType,
        schema_version: &str,
        rules: Vec<RuleEntry>,
        external: ExternalParameter,
        payload: Value,
    ) -> Result<Vec<ValidationResult>> {
        let engine = Arc::clone(&self.engine);
        let schema_version = schema_version.to_string();
        tokio::task::spawn_blocking(move || {
            engine.validate(certificate_type, &schema_version, &rules, &external, &payload)
        })
        .await
        .map_err(|e| RuleEngineError::EvaluationTask(e.to_string()))
    }
}
