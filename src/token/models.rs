use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use std::fmt;

/// JWT claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    pub sub: String, // Subject (user ID)
    pub sid: String, // token_id of the refresh token this access token was minted under
    pub iat: i64,    // Issued at timestamp (standard JWT claim)
    pub exp: i64,    // Expiration timestamp (standard JWT claim)
}

impl AccessClaims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// Database model for the refresh_tokens table.
///
/// `token_id` is the SHA-256 digest of the secret handed to the client, so
/// neither the registry nor an access token ever holds a usable refresh token.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token_id: String,
    pub subject_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshToken {
    pub fn new(token_id: String, subject_id: String, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_id,
            subject_id,
            issued_at,
            expires_at: issued_at + ttl,
            revoked: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True iff the token is neither revoked nor expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    /// Short prefix of the token ID, safe to write to logs
    pub fn hint(&self) -> &str {
        token_hint(&self.token_id)
    }
}

/// Derives the registry key for a refresh token secret
pub fn refresh_token_id(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

/// Returns at most the first six characters of a token ID
pub fn token_hint(token_id: &str) -> &str {
    let end = token_id
        .char_indices()
        .nth(6)
        .map(|(index, _)| index)
        .unwrap_or(token_id.len());
    &token_id[..end]
}

/// Tokens handed out on a successful login
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Secret the client presents on refresh and logout
    pub refresh_token: String,
    /// Registry record for `refresh_token`
    pub record: RefreshToken,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("record", &self.record)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_token_validity_window() {
        let issued_at = Utc::now();
        let token = RefreshToken::new(
            "token-123".to_string(),
            "user-1".to_string(),
            issued_at,
            Duration::days(7),
        );

        assert!(token.is_valid_at(issued_at));
        assert!(token.is_valid_at(issued_at + Duration::days(7)));
        assert!(!token.is_valid_at(issued_at + Duration::days(7) + Duration::seconds(1)));
    }

    #[test]
    fn test_revoked_token_is_invalid() {
        let mut token = RefreshToken::new(
            "token-123".to_string(),
            "user-1".to_string(),
            Utc::now(),
            Duration::days(7),
        );
        token.revoked = true;

        assert!(!token.is_valid_at(Utc::now()));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_id_is_stable_digest() {
        let id = refresh_token_id("secret-value");

        assert_eq!(id.len(), 64);
        assert_eq!(id, refresh_token_id("secret-value"));
        assert_ne!(id, refresh_token_id("other-secret"));
        assert!(!id.contains("secret"));
    }

    #[test]
    fn test_token_pair_debug_redacts_secrets() {
        let record = RefreshToken::new(
            refresh_token_id("refresh-secret"),
            "user-1".to_string(),
            Utc::now(),
            Duration::days(1),
        );
        let pair = TokenPair {
            access_token: "access-secret".to_string(),
            refresh_token: "refresh-secret".to_string(),
            record,
        };

        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
    }

    #[test]
    fn test_token_hint_short_input() {
        assert_eq!(token_hint("abc"), "abc");
        assert_eq!(token_hint(""), "");
    }

    #[test]
    fn test_access_claims_expiry() {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: "user-1".to_string(),
            sid: "token-1".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + 60,
        };

        assert!(!claims.is_expired_at(now));
        assert!(!claims.is_expired_at(now + Duration::seconds(60)));
        assert!(claims.is_expired_at(now + Duration::seconds(61)));
    }
}
