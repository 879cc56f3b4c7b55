//! Lenient semantic version parsing for rule metadata
//!
//! Authorities publish versions like `1.0` or `1.0.0`; both must compare
//! equal. Unparsable versions never satisfy a compatibility check.

use semver::Version;

pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}
