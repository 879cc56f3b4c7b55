// Error codes implementation
// Stable, machine-readable codes surfaced alongside every trust and rule error

pub mod trust {
    pub const FETCH_FAILED: &str = "TRUST_1001";
    pub const STALE_BEYOND_LIMIT: &str = "TRUST_1002";
    pub const NO_TRUST_DATA: &str = "TRUST_1003";
    pub const STORAGE_FAILED: &str = "TRUST_1004";
    pub const DECODE_FAILED: &str = "TRUST_1005";
    pub const REFRESH_ABORTED: &str = "TRUST_1006";
    pub const INVALID_CONFIGURATION: &str = "TRUST_1007";
}

pub mod rules {
    pub const INTERPRETATION_FAILED: &str = "RULES_2001";
    pub const INVALID_LOGIC: &str = "RULES_2002";
    pub const MISSING_FIELD: &str = "RULES_2003";
    pub const TYPE_MISMATCH: &str = "RULES_2004";
    pub const UNSUPPORTED_COUNTRY: &str = "RULES_2005";
    pub const UNSUPPORTED_ENGINE: &str = "RULES_2006";
    pub const RULE_SET_UNAVAILABLE: &str = "RULES_2007";
}

pub mod logging {
    pub const ALREADY_INITIALISED: &str = "LOG_3001";
    pub const INVALID_FILTER: &str = "LOG_3002";
}
