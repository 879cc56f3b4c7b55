// Error reporting utilities
// Errors that have no caller left to receive them (background refreshes) end up here

use crate::context::ErrorContext;
use crate::types::CodedError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, error: &dyn CodedError, context: &ErrorContext) {
        let material = context.trust_material.as_deref().unwrap_or("-");
        let country = context.country.as_deref().unwrap_or("-");
        let rule_id = context.rule_id.as_deref().unwrap_or("-");

        if error.is_recoverable() {
            tracing::warn!(
                error_code = error.code(),
                error_category = %error.category(),
                trust_material = material,
                country = country,
                rule_id = rule_id,
                extra = ?context.additional,
                "Recoverable error: {}",
                error
            );
        } else {
            tracing::error!(
                error_code = error.code(),
                error_category = %error.category(),
                trust_material = material,
                country = country,
                rule_id = rule_id,
                extra = ?context.additional,
                "Error: {}",
                error
            );
        }
    }
}
