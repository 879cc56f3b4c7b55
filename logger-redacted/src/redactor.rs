use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    // URN:UVCI:01:DE:ABC123#X style certificate identifiers
    static ref UVCI_REGEX: Regex =
        Regex::new(r"(?i)\b(?:URN:UVCI:)[A-Z0-9:/#_\-]+").expect("UVCI pattern is valid");

    // Process-wide redactor behind the free functions, replaced by `init_logging`
    static ref GLOBAL_REDACTOR: RwLock<IdentifierRedactor> =
        RwLock::new(IdentifierRedactor::default());
}

/// Identifier redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// Replaces certificate identifiers with short correlation hashes
#[derive(Debug, Clone, Default)]
pub struct IdentifierRedactor {
    config: RedactionConfig,
}

impl IdentifierRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            enabled: false,
            custom_patterns: Vec::new(),
        })
    }

    /// Redact UVCI-shaped tokens and custom patterns inside free text
    pub fn redact(&self, text: &str) -> String {
        if !self.config.enabled {
            return text.to_string();
        }

        let mut result = UVCI_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                format!("UVCI[{}]", hash_value(&caps[0]))
            })
            .to_string();

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Hash a bare identifier (UVCI, key id, revocation hash)
    pub fn redact_identifier(&self, identifier: &str) -> String {
        if self.config.enabled {
            format!("ID[{}]", hash_value(identifier))
        } else {
            identifier.to_string()
        }
    }
}

/// Replace the process-wide redactor used by [`redact_identifier`] and
/// [`redact_text`]
pub fn install_global_redactor(redactor: IdentifierRedactor) {
    *GLOBAL_REDACTOR.write() = redactor;
}

/// Hash a bare identifier with the process-wide redactor. Passes the
/// identifier through unchanged when redaction is disabled.
pub fn redact_identifier(identifier: &str) -> String {
    GLOBAL_REDACTOR.read().redact_identifier(identifier)
}

pub fn redact_text(text: &str) -> String {
    GLOBAL_REDACTOR.read().redact(text)
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    // First 8 bytes keep log lines short while staying correlatable
    general_purpose::STANDARD_NO_PAD.encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uvci_redaction() {
        let redactor = IdentifierRedactor::default();
        let text = "lookup URN:UVCI:01:DE:187/37512422923#Z finished";
        let redacted = redactor.redact(text);

        assert!(!redacted.contains("187/37512422923"));
        assert!(redacted.starts_with("lookup UVCI["));
        assert!(redacted.ends_with("] finished"));
    }

    #[test]
    fn test_same_identifier_same_hash() {
        let redactor = IdentifierRedactor::default();
        let a = redactor.redact_identifier("01DE/84503/1119349007/DXSGWLWL40SU8ZFKIYIBK39A3#S");
        let b = redactor.redact_identifier("01DE/84503/1119349007/DXSGWLWL40SU8ZFKIYIBK39A3#S");
        assert_eq!(a, b);
        assert!(a.starts_with("ID["));
        assert_ne!(a, redactor.redact_identifier("something-else"));
    }

    #[test]
    fn test_disabled_passes_through() {
        let redactor = IdentifierRedactor::disabled();
        let text = "URN:UVCI:01:AT:10807843F94AEE0EE5093FBC254BD813#B";
        assert_eq!(redactor.redact(text), text);
        assert_eq!(redactor.redact_identifier("kid-1"), "kid-1");
    }

    #[test]
    fn test_custom_pattern() {
        let redactor = IdentifierRedactor::new(RedactionConfig {
            enabled: true,
            custom_patterns: vec![(Regex::new(r"kid=\S+").unwrap(), "kid=[REDACTED]".to_string())],
        });
        assert_eq!(redactor.redact("anchor kid=abc123 missing"), "anchor kid=[REDACTED] missing");
    }
}
