/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The `typ` claim records which
/// kind a token was minted as; `jti` makes every token unique even when two are
/// issued for the same subject within the same second.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TokenError;

/// Discriminates the two token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub typ: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Token ID
    pub jti: String,
}

impl Claims {
    /// Create claims for `account_id` expiring `lifetime_seconds` from now
    pub fn new(account_id: Uuid, typ: TokenKind, lifetime_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: account_id.to_string(),
            typ,
            iat: now,
            exp: now + lifetime_seconds,
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the account ID from the subject claim
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let account_id = Uuid::new_v4();
        let claims = Claims::new(account_id, TokenKind::Refresh, 3600, "test");

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.typ, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_claims_are_unique_per_issue() {
        let account_id = Uuid::new_v4();
        let first = Claims::new(account_id, TokenKind::Refresh, 3600, "test");
        let second = Claims::new(account_id, TokenKind::Refresh, 3600, "test");

        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_invalid_subject() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenKind::Access, 3600, "test");
        claims.sub = "invalid-uuid".to_string();

        assert_eq!(claims.account_id(), Err(TokenError::Malformed));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TokenKind::Refresh).unwrap();
        assert_eq!(json, "\"refresh\"");
    }
}
