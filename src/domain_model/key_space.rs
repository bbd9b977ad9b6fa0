use super::{RequestFingerprint, TokenId, TokenType};

/// Layout of every key this service writes to the shared store.
///
/// Whitelist keys live under `{prefix}:whitelist:` so a logout-all scan
/// never touches lock or cache keys.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        KeySpace {
            prefix: prefix.into(),
        }
    }

    pub fn whitelist_entry(&self, token_type: TokenType, token_id: &TokenId) -> String {
        format!("{}:whitelist:{}:{}", self.prefix, token_type, token_id)
    }

    pub fn whitelist_pattern(&self) -> String {
        format!("{}:whitelist:*", self.prefix)
    }

    pub fn refresh_lock(&self, fingerprint: &RequestFingerprint) -> String {
        format!("{}:refresh_lock:{}", self.prefix, fingerprint)
    }

    pub fn refresh_response(&self, fingerprint: &RequestFingerprint) -> String {
        format!("{}:refresh_req:{}", self.prefix, fingerprint)
    }
}
