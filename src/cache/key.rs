//! Query fingerprinting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    /// Normalized query text the hash was derived from.
    pub normalized_query: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            normalized_query: String::new(),
        }
    }
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Derives stable cache keys from a query plus the parameters that change its answer.
///
/// Queries differing only in case or whitespace share a key; any parameter
/// difference (e.g. `top_k`) yields a different key.
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    case_sensitive: bool,
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self {
            case_sensitive: false,
            salt: None,
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn normalize(&self, query: &str) -> String {
        let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.case_sensitive {
            collapsed
        } else {
            collapsed.to_lowercase()
        }
    }

    pub fn fingerprint(&self, query: &str, params: &BTreeMap<String, String>) -> CacheKey {
        let normalized = self.normalize(query);
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("query", normalized.clone());
        for (k, v) in params {
            parts.insert(k.as_str(), v.clone());
        }
        if let Some(ref s) = self.salt {
            parts.insert("__salt", s.clone());
        }
        // A BTreeMap of strings always serializes.
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey {
            hash,
            normalized_query: normalized,
        }
    }

    /// Fingerprint of a bare query with no extra parameters.
    pub fn fingerprint_query(&self, query: &str) -> CacheKey {
        self.fingerprint(query, &BTreeMap::new())
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(top_k: usize) -> BTreeMap<String, String> {
        BTreeMap::from([("top_k".to_string(), top_k.to_string())])
    }

    #[test]
    fn whitespace_and_case_are_normalized() {
        let gen = CacheKeyGenerator::new();
        let a = gen.fingerprint("What is  the main\tcontribution?", &params(3));
        let b = gen.fingerprint("  what is the main contribution? ", &params(3));
        assert_eq!(a, b);
        assert_eq!(a.normalized_query, "what is the main contribution?");
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn parameters_change_the_key() {
        let gen = CacheKeyGenerator::new();
        let a = gen.fingerprint("summarize the paper", &params(3));
        let b = gen.fingerprint("summarize the paper", &params(5));
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn salt_changes_the_key() {
        let plain = CacheKeyGenerator::new().fingerprint_query("q");
        let salted = CacheKeyGenerator::new().with_salt("v2").fingerprint_query("q");
        assert_ne!(plain.hash, salted.hash);
    }

    #[test]
    fn case_sensitive_mode_keeps_case() {
        let gen = CacheKeyGenerator::new().case_sensitive(true);
        assert_ne!(gen.fingerprint_query("Rust"), gen.fingerprint_query("rust"));
    }
}
