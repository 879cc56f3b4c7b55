use error_common::{codes, CodedError, ErrorCategory};
use thiserror::Error;
use trust_sync::TrustError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleEngineError {
    #[error("Invalid rule logic: {0}")]
    InvalidLogic(String),

    #[error("Unknown logic operator: {0}")]
    UnknownOperator(String),

    #[error("Referenced field is missing: {0}")]
    MissingField(String),

    #[error("Type mismatch in '{operator}': {detail}")]
    TypeMismatch { operator: String, detail: String },

    #[error("No rule set available for country: {0}")]
    UnsupportedCountry(String),

    #[error("No rule for country {country} can be evaluated by {engine} {max_version}")]
    UnsupportedEngine {
        country: String,
        engine: String,
        max_version: String,
    },

    #[error("Invalid engine version: {0}")]
    InvalidEngineVersion(String),

    #[error("Trust data unavailable: {0}")]
    TrustData(#[from] TrustError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Rule evaluation task failed: {0}")]
    EvaluationTask(String),
}

impl RuleEngineError {
    pub fn type_mismatch(operator: &str, detail: impl Into<String>) -> Self {
        RuleEngineError::TypeMismatch {
            operator: operator.to_string(),
            detail: detail.into(),
        }
    }
}

impl CodedError for RuleEngineError {
    fn code(&self) -> &'static str {
        match self {
            RuleEngineError::InvalidLogic(_) | RuleEngineError::UnknownOperator(_) => {
                codes::rules::INVALID_LOGIC
            }
            RuleEngineError::MissingField(_) => codes::rules::MISSING_FIELD,
            RuleEngineError::TypeMismatch { .. } => codes::rules::TYPE_MISMATCH,
            RuleEngineError::UnsupportedCountry(_) => codes::rules::UNSUPPORTED_COUNTRY,
            RuleEngineError::UnsupportedEngine { .. } | RuleEngineError::InvalidEngineVersion(_) => {
                codes::rules::UNSUPPORTED_ENGINE
            }
            RuleEngineError::TrustData(_) => codes::rules::RULE_SET_UNAVAILABLE,
            RuleEngineError::Serialization(_) | RuleEngineError::EvaluationTask(_) => {
                codes::rules::INTERPRETATION_FAILED
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            RuleEngineError::InvalidLogic(_)
            | RuleEngineError::UnknownOperator(_)
            | RuleEngineError::MissingField(_)
            | RuleEngineError::TypeMismatch { .. }
            | RuleEngineError::Serialization(_) => ErrorCategory::RuleEvaluation,
            RuleEngineError::UnsupportedCountry(_) | RuleEngineError::UnsupportedEngine { .. } => {
                ErrorCategory::Unsupported
            }
            RuleEngineError::InvalidEngineVersion(_) => ErrorCategory::Configuration,
            RuleEngineError::EvaluationTask(_) => ErrorCategory::Internal,
            RuleEngineError::TrustData(inner) => inner.category(),
        }
    }

    /// Interpretation errors only ever downgrade a single rule to OPEN
    fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::RuleEvaluation)
    }
}

impl From<serde_json::Error> for RuleEngineError {
    fn from(err: serde_json::Error) -> Self {
        RuleEngineError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuleEngineError>;
