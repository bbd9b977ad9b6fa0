use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic hash of a request's canonical JSON encoding.
///
/// Keys both the refresh lock and the refresh response cache, so two
/// byte-different bodies that deserialize to the same request share one
/// fingerprint.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    pub fn of<T: Serialize>(request: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(request)?;
        let digest = Sha256::digest(&canonical);
        Ok(RequestFingerprint(hex::encode(&digest[..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
