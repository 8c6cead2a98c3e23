/// JWT Token Generation and Validation
///
/// Access and refresh tokens are HS256 JWTs signed with two different secrets,
/// so a token of one kind never verifies as the other.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::AuthSettings;
use crate::error::AppError;

/// Why a presented token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    InvalidSignature,
    Expired,
    Malformed,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "signature does not verify"),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::Malformed => write!(f, "token cannot be parsed"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::InvalidSignature
            | JwtErrorKind::InvalidIssuer
            | JwtErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: i64,
}

impl SigningKey {
    fn from_secret(secret: &str, lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Token Issuer and Verifier
///
/// Pure and lock-free; cloned into every worker.
#[derive(Clone)]
pub struct TokenKeys {
    access: SigningKey,
    refresh: SigningKey,
    issuer: String,
}

impl TokenKeys {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            access: SigningKey::from_secret(
                &settings.access_token_secret,
                settings.access_token_expiry,
            ),
            refresh: SigningKey::from_secret(
                &settings.refresh_token_secret,
                settings.refresh_token_expiry,
            ),
            issuer: settings.issuer.clone(),
        }
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn access_token_lifetime(&self) -> i64 {
        self.access.lifetime
    }

    pub fn refresh_token_lifetime(&self) -> i64 {
        self.refresh.lifetime
    }

    /// Build the claims a token of `kind` would carry for `account_id`
    pub fn claims_for(&self, account_id: Uuid, kind: TokenKind) -> Claims {
        Claims::new(account_id, kind, self.key(kind).lifetime, &self.issuer)
    }

    /// Sign `claims` with the secret belonging to `claims.typ`
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key(claims.typ).encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    pub fn issue_access_token(&self, account_id: Uuid) -> Result<String, AppError> {
        self.sign(&self.claims_for(account_id, TokenKind::Access))
    }

    pub fn issue_refresh_token(&self, account_id: Uuid) -> Result<String, AppError> {
        self.sign(&self.claims_for(account_id, TokenKind::Refresh))
    }

    pub fn issue_pair(&self, account_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(account_id)?,
            refresh_token: self.issue_refresh_token(account_id)?,
            expires_in: self.access.lifetime,
        })
    }

    /// Verify `token` as `expected` and return its subject
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let claims = decode::<Claims>(token, &self.key(expected).decoding, &validation)
            .map(|data| data.claims)?;

        if claims.typ != expected {
            return Err(TokenError::InvalidSignature);
        }

        claims.account_id()
    }
}
