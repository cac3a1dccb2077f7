use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distr::Alphanumeric, Rng};
use tracing::{debug, instrument};

use super::{
    errors::TokenError,
    models::{refresh_token_id, AccessClaims, RefreshToken, TokenPair},
};
use crate::config::TokenConfig;
use crate::user::UserIdentity;

const REFRESH_SECRET_LENGTH: usize = 64;

/// Mints access/refresh token pairs and validates access tokens
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in validate_access_at against the supplied clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.signing_key()),
            decoding_key: DecodingKey::from_secret(config.signing_key()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Mints a token pair for the given user
    pub fn issue(&self, user: &UserIdentity) -> Result<TokenPair, TokenError> {
        self.issue_at(user, Utc::now())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn issue_at(&self, user: &UserIdentity, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let refresh_secret = generate_refresh_secret();
        let record = RefreshToken::new(
            refresh_token_id(&refresh_secret),
            user.id.clone(),
            now,
            self.refresh_ttl,
        );
        let access_token = self.encode_access(&record, now)?;

        debug!(
            token_hint = %record.hint(),
            refresh_expires_at = %record.expires_at,
            "Issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_secret,
            record,
        })
    }

    /// Mints a fresh access token under an already validated refresh token
    pub fn reissue_access(&self, record: &RefreshToken) -> Result<String, TokenError> {
        self.encode_access(record, Utc::now())
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.validate_access_at(token, Utc::now())
    }

    /// Checks signature then expiry; performs no I/O
    pub fn validate_access_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected access token");
                TokenError::Tampered
            })?;

        if claims.is_expired_at(now) {
            debug!(user_id = %claims.sub, exp = claims.exp, "Access token expired");
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn encode_access(&self, record: &RefreshToken, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AccessClaims {
            sub: record.subject_id.clone(),
            sid: record.token_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

/// High-entropy alphanumeric secret from the thread-local CSPRNG
fn generate_refresh_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_SECRET_LENGTH)
        .map(char::from)
        .collect()
}
