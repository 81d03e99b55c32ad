//! Authenticated caller identity.
//!
//! Every vault, ledger and audit operation is attributed to a caller. The
//! identity is established at the serving boundary (a bearer token, or the
//! `--user` flag on the CLI) before any cryptography runs.

use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};

const MAX_CALLER_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Validate a raw identity. Missing, blank, over-long, or whitespace/control
    /// containing identities are rejected with `AuthenticationRequired`.
    pub fn parse(raw: Option<&str>) -> SealResult<Self> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SealError::AuthenticationRequired("no caller identity".into()))?;

        if raw.len() > MAX_CALLER_LEN || raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SealError::AuthenticationRequired(
                "invalid caller identity".into(),
            ));
        }
        Ok(CallerId(raw.to_string()))
    }

    /// Parse an `Authorization` header value of the form `Bearer <identity>`.
    pub fn from_authorization(header: Option<&str>) -> SealResult<Self> {
        let token = header.map(|h| {
            let h = h.trim();
            if h == "Bearer" {
                ""
            } else {
                h.strip_prefix("Bearer ").map(str::trim).unwrap_or(h)
            }
        });
        Self::parse(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_identity_rejected() {
        for raw in [None, Some(""), Some("   ")] {
            let err = CallerId::parse(raw).expect_err("blank identity must fail");
            assert!(matches!(err, SealError::AuthenticationRequired(_)));
        }
    }

    #[test]
    fn test_invalid_identity_rejected() {
        assert!(CallerId::parse(Some("alice bob")).is_err());
        assert!(CallerId::parse(Some("alice\u{0}")).is_err());
        assert!(CallerId::parse(Some(&"a".repeat(129))).is_err());
    }

    #[test]
    fn test_identity_is_trimmed() {
        let id = CallerId::parse(Some("  alice  ")).unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }

    #[test]
    fn test_bearer_header() {
        let id = CallerId::from_authorization(Some("Bearer user-42")).unwrap();
        assert_eq!(id.as_str(), "user-42");
        assert!(CallerId::from_authorization(None).is_err());
        assert!(CallerId::from_authorization(Some("Bearer ")).is_err());
    }
}
