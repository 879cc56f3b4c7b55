// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    /// Hash certificate identifiers before they are logged
    pub redaction_enabled: bool,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            redaction_enabled: true,
            with_target: false,
        }
    }
}
