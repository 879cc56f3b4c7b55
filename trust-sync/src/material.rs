//! Built-in trust-material kinds and their decoded forms

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::error::{TrustError, TrustResult};

/// A class of remotely issued trust data. The manager treats downloaded
/// payloads as opaque bytes until they are decoded here; a payload that
/// fails to decode never replaces the cached copy.
pub trait TrustMaterial: Send + Sync + 'static {
    /// Stable name used for logs, file names and error messages
    const KIND: &'static str;

    type Data: Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns [`TrustError::Decode`] for malformed payloads.
    fn decode(payload: &[u8]) -> TrustResult<Self::Data>;
}

// =============================================================================
// Revocation list
// =============================================================================

/// Revoked certificate identifiers, distributed as hex SHA-256 hashes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationEntries {
    hashes: HashSet<String>,
}

impl RevocationEntries {
    pub fn from_hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hashes: hashes
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Matches the identifier either as an already hashed value or by its
    /// SHA-256 digest
    pub fn contains(&self, identifier: &str) -> bool {
        let normalized = identifier.trim();
        self.hashes.contains(&normalized.to_ascii_lowercase())
            || self.hashes.contains(&hash_identifier(normalized))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

pub fn hash_identifier(identifier: &str) -> String {
    hex::encode(Sha256::digest(identifier.as_bytes()))
}

pub struct RevocationList;

impl TrustMaterial for RevocationList {
    const KIND: &'static str = "revocation-list";
    type Data = RevocationEntries;

    fn decode(payload: &[u8]) -> TrustResult<Self::Data> {
        let hashes: Vec<String> =
            serde_json::from_slice(payload).map_err(|e| TrustError::decode(Self::KIND, e))?;
        if let Some(bad) = hashes
            .iter()
            .find(|h| h.len() != 64 || !h.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(TrustError::decode(
                Self::KIND,
                format!("entry '{}' is not a hex SHA-256 hash", bad),
            ));
        }
        Ok(RevocationEntries::from_hashes(hashes))
    }
}

// =============================================================================
// Trust anchors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAnchor {
    /// Key identifier referenced from a certificate's protected header
    pub kid: String,
    pub country: String,
    /// Base64 SubjectPublicKeyInfo; verification happens elsewhere
    pub public_key: String,
    /// Certificate types this key may sign, empty meaning all
    #[serde(default)]
    pub key_usage: Vec<String>,
}

impl TrustAnchor {
    pub fn allows(&self, certificate_type: &str) -> bool {
        self.key_usage.is_empty()
            || self
                .key_usage
                .iter()
                .any(|usage| usage.eq_ignore_ascii_case(certificate_type))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchors {
    by_kid: HashMap<String, Vec<TrustAnchor>>,
}

impl TrustAnchors {
    /// Several keys may share a kid; all of them are candidates
    pub fn find(&self, kid: &str) -> &[TrustAnchor] {
        self.by_kid.get(kid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_kid.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kid.is_empty()
    }
}

pub struct TrustAnchorList;

impl TrustMaterial for TrustAnchorList {
    const KIND: &'static str = "trust-anchors";
    type Data = TrustAnchors;

    fn decode(payload: &[u8]) -> TrustResult<Self::Data> {
        let anchors: Vec<TrustAnchor> =
            serde_json::from_slice(payload).map_err(|e| TrustError::decode(Self::KIND, e))?;
        let mut by_kid: HashMap<String, Vec<TrustAnchor>> = HashMap::new();
        for anchor in anchors {
            by_kid.entry(anchor.kid.clone()).or_default().push(anchor);
        }
        Ok(TrustAnchors { by_kid })
    }
}

// =============================================================================
// Value sets
// =============================================================================

/// Named sets of valid codes referenced by business rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSets {
    sets: HashMap<String, HashSet<String>>,
}

impl ValueSets {
    pub fn get(&self, name: &str) -> Option<&HashSet<String>> {
        self.sets.get(name)
    }

    /// Copy in the shape the rule engine expects, codes sorted for
    /// deterministic evaluation
    pub fn as_map(&self) -> HashMap<String, Vec<String>> {
        self.sets
            .iter()
            .map(|(name, codes)| {
                let mut codes: Vec<String> = codes.iter().cloned().collect();
                codes.sort();
                (name.clone(), codes)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

pub struct ValueSetBundle;

impl TrustMaterial for ValueSetBundle {
    const KIND: &'static str = "value-sets";
    type Data = ValueSets;

    fn decode(payload: &[u8]) -> TrustResult<Self::Data> {
        let sets: HashMap<String, HashSet<String>> =
            serde_json::from_slice(payload).map_err(|e| TrustError::decode(Self::KIND, e))?;
        Ok(ValueSets { sets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_matches_raw_and_hashed() {
        let hash = hash_identifier("URN:UVCI:01:DE:ABC#1");
        let payload = serde_json::to_vec(&vec![hash.to_uppercase()]).unwrap();
        let entries = RevocationList::decode(&payload).unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries.contains("URN:UVCI:01:DE:ABC#1"));
        assert!(entries.contains(&hash));
        assert!(!entries.contains("URN:UVCI:01:DE:ABC#2"));
    }

    #[test]
    fn test_revocation_rejects_non_hash_entries() {
        let payload = br#"["not-a-hash"]"#;
        assert!(matches!(
            RevocationList::decode(payload),
            Err(TrustError::Decode { kind: "revocation-list", .. })
        ));
        assert!(RevocationList::decode(b"{}").is_err());
    }

    #[test]
    fn test_trust_anchor_lookup() {
        let payload = br#"[
            {"kid":"a1","country":"DE","publicKey":"MFkw","keyUsage":["v"]},
            {"kid":"a1","country":"DE","publicKey":"MFkx"},
            {"kid":"b2","country":"AT","publicKey":"MFky","keyUsage":["t","r"]}
        ]"#;
        let anchors = TrustAnchorList::decode(payload).unwrap();

        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors.find("a1").len(), 2);
        assert!(anchors.find("zz").is_empty());

        let b2 = &anchors.find("b2")[0];
        assert!(b2.allows("T"));
        assert!(!b2.allows("v"));
        assert!(anchors.find("a1")[1].allows("anything"));
    }

    #[test]
    fn test_value_sets() {
        let payload = br#"{"covid-19-lab-result":["260415000","260373001"],"disease-agent-targeted":["840539006"]}"#;
        let sets = ValueSetBundle::decode(payload).unwrap();

        assert_eq!(sets.len(), 2);
        assert!(sets.get("disease-agent-targeted").unwrap().contains("840539006"));
        assert!(sets.get("missing").is_none());
        assert_eq!(
            sets.as_map()["covid-19-lab-result"],
            vec!["260373001".to_string(), "260415000".to_string()]
        );
    }
}
