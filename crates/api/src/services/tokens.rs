//! JWT access/refresh tokens.
//!
//! Tokens are HS256-signed with the server secret. Access tokens authenticate
//! API requests and double as email-verification tokens; refresh tokens mint
//! new access tokens until they expire or are blacklisted by logout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use ecommerce_core::UserId;

use crate::config::TokenConfig;
use crate::models::TokenPair;

/// Errors from token issuing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Signature was valid but `exp` has passed.
    #[error("token has expired")]
    Expired,

    /// Malformed token, bad signature, or wrong token type.
    #[error("token is invalid")]
    Invalid,

    /// Encoding failed.
    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: UserId,
    /// Unique token ID, used to blacklist refresh tokens.
    pub jti: Uuid,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Issues and validates JWTs.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    /// Create a token service keyed by the server secret.
    #[must_use]
    pub fn new(secret: &SecretString, config: &TokenConfig) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_lifetime: config.access_lifetime,
            refresh_lifetime: config.refresh_lifetime,
        }
    }

    /// Issue a fresh refresh/access pair for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_pair(&self, user: UserId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            refresh: self.issue(user, TokenType::Refresh)?,
            access: self.issue(user, TokenType::Access)?,
        })
    }

    /// Issue an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_access(&self, user: UserId) -> Result<String, TokenError> {
        self.issue(user, TokenType::Access)
    }

    fn issue(&self, user: UserId, token_type: TokenType) -> Result<String, TokenError> {
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);

        self.encode(&Claims {
            token_type,
            user_id: user,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now.saturating_add(lifetime),
        })
    }

    pub(crate) fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Validate an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Access)
    }

    /// Validate a refresh token (signature, expiry and type only).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Refresh)
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn service() -> TokenService {
        let config = test_config();
        TokenService::new(&config.secret_key, &config.tokens)
    }

    #[test]
    fn test_issue_pair_roundtrip() {
        let tokens = service();
        let pair = tokens.issue_pair(UserId::new(7)).unwrap();

        let access = tokens.validate_access(&pair.access).unwrap();
        assert_eq!(access.user_id, UserId::new(7));
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.exp - access.iat, 300);

        let refresh = tokens.validate_refresh(&pair.refresh).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 86_400);
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_wrong_token_type_is_invalid() {
        let tokens = service();
        let pair = tokens.issue_pair(UserId::new(1)).unwrap();

        assert_eq!(
            tokens.validate_refresh(&pair.access).unwrap_err(),
            TokenError::Invalid
        );
        assert_eq!(
            tokens.validate_access(&pair.refresh).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let now = Utc::now().timestamp();
        let token = tokens
            .encode(&Claims {
                token_type: TokenType::Access,
                user_id: UserId::new(1),
                jti: Uuid::new_v4(),
                iat: now - 600,
                exp: now - 300,
            })
            .unwrap();

        assert_eq!(tokens.validate_access(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_garbage_and_foreign_tokens_are_invalid() {
        let tokens = service();
        assert_eq!(tokens.validate_access("not-a-jwt").unwrap_err(), TokenError::Invalid);

        let other = TokenService::new(
            &SecretString::from("a-completely-different-signing-key-123"),
            &test_config().tokens,
        );
        let foreign = other.issue_access(UserId::new(1)).unwrap();
        assert_eq!(tokens.validate_access(&foreign).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
