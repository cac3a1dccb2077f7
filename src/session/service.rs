use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::types::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest};
use crate::shared::{AppError, FieldErrors};
use crate::token::{
    refresh_token_id, AccessClaims, RegistryError, TokenError, TokenIssuer, TokenPair,
    TokenRegistry,
};
use crate::user::{CredentialError, CredentialStore, PublicIdentity};

pub const LOGIN_FAILED: &str = "No active account found with the given credentials";
pub const INVALID_REFRESH_TOKEN: &str = "Token is invalid or expired";
pub const INVALID_ACCESS_TOKEN: &str = "Given token not valid for any token type";
pub const USER_NOT_FOUND: &str = "User not found";
const DUPLICATE_IDENTIFIER: &str = "A user with that identifier already exists.";

/// How protected requests treat access tokens whose refresh token was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevocationPolicy {
    /// Access tokens stay valid until they expire
    #[default]
    Lenient,
    /// Access tokens are rejected once their refresh token is revoked
    Strict,
}

impl RevocationPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Orchestrates register, login, logout and the token guards
pub struct SessionService {
    credentials: CredentialStore,
    issuer: TokenIssuer,
    registry: Arc<dyn TokenRegistry + Send + Sync>,
    policy: RevocationPolicy,
}

impl SessionService {
    pub fn new(
        credentials: CredentialStore,
        issuer: TokenIssuer,
        registry: Arc<dyn TokenRegistry + Send + Sync>,
        policy: RevocationPolicy,
    ) -> Self {
        Self {
            credentials,
            issuer,
            registry,
            policy,
        }
    }

    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<PublicIdentity, AppError> {
        let valid = request.validate()?;

        let user = self
            .credentials
            .register(&valid.identifier, &valid.credential)
            .await
            .map_err(registration_error)?;

        Ok(user.to_public())
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, AppError> {
        let valid = request.validate()?;

        let user = self
            .credentials
            .verify(&valid.identifier, &valid.credential)
            .await
            .map_err(|e| match e {
                CredentialError::NotFound | CredentialError::CredentialMismatch => {
                    AppError::AuthenticationFailed(LOGIN_FAILED.to_string())
                }
                other => AppError::internal(other),
            })?;

        let pair = self.issuer.issue(&user).map_err(AppError::internal)?;
        self.registry
            .register(&pair.record)
            .await
            .map_err(AppError::internal)?;

        info!(user_id = %user.id, token_hint = %pair.record.hint(), "Login succeeded");
        Ok(pair)
    }

    /// Revokes a refresh token owned by the authenticated caller
    #[instrument(skip(self, claims, request), fields(user_id = %claims.sub))]
    pub async fn logout(&self, claims: &AccessClaims, request: LogoutRequest) -> Result<(), AppError> {
        let secret = request.validate()?;
        let token_id = refresh_token_id(&secret);

        let record = self
            .registry
            .get(&token_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| {
                warn!("Logout with unknown refresh token");
                invalid_refresh_token()
            })?;

        if record.subject_id != claims.sub {
            warn!(token_hint = %record.hint(), "Logout with refresh token owned by another user");
            return Err(invalid_refresh_token());
        }
        if record.is_expired() {
            debug!(token_hint = %record.hint(), "Logout with expired refresh token");
            return Err(invalid_refresh_token());
        }

        match self.registry.revoke(&token_id).await {
            Ok(()) => {
                info!(token_hint = %record.hint(), "Logout succeeded");
                Ok(())
            }
            Err(RegistryError::NotFound | RegistryError::AlreadyRevoked) => {
                warn!(token_hint = %record.hint(), "Logout with revoked refresh token");
                Err(invalid_refresh_token())
            }
            Err(e) => Err(AppError::internal(e)),
        }
    }

    /// Guard for protected requests
    #[instrument(skip(self, access_token))]
    pub async fn authorize(&self, access_token: &str) -> Result<AccessClaims, AppError> {
        let claims = self
            .issuer
            .validate_access(access_token)
            .map_err(|e| match e {
                TokenError::Expired | TokenError::Tampered => {
                    AppError::AuthenticationFailed(INVALID_ACCESS_TOKEN.to_string())
                }
                TokenError::Encoding(detail) => AppError::Internal(detail),
            })?;

        if self.policy == RevocationPolicy::Strict {
            let live = self
                .registry
                .is_valid(&claims.sid)
                .await
                .map_err(AppError::internal)?;
            if !live {
                warn!(user_id = %claims.sub, "Access token bound to a revoked session");
                return Err(AppError::AuthenticationFailed(INVALID_ACCESS_TOKEN.to_string()));
            }
        }

        Ok(claims)
    }

    /// Mints a new access token from a live refresh token
    #[instrument(skip(self, request))]
    pub async fn refresh(&self, request: RefreshRequest) -> Result<String, AppError> {
        let secret = request.validate()?;
        let token_id = refresh_token_id(&secret);

        let record = self
            .registry
            .get(&token_id)
            .await
            .map_err(AppError::internal)?
            .filter(|record| record.is_valid_at(Utc::now()))
            .ok_or_else(|| {
                warn!("Refresh rejected");
                invalid_refresh_token()
            })?;

        let access_token = self
            .issuer
            .reissue_access(&record)
            .map_err(AppError::internal)?;

        debug!(user_id = %record.subject_id, token_hint = %record.hint(), "Access token refreshed");
        Ok(access_token)
    }

    #[instrument(skip(self, claims), fields(user_id = %claims.sub))]
    pub async fn current_identity(&self, claims: &AccessClaims) -> Result<PublicIdentity, AppError> {
        self.credentials
            .find_by_id(&claims.sub)
            .await
            .map_err(AppError::internal)?
            .map(|user| user.to_public())
            .ok_or_else(|| AppError::AuthenticationFailed(USER_NOT_FOUND.to_string()))
    }
}

fn invalid_refresh_token() -> AppError {
    AppError::AuthenticationFailed(INVALID_REFRESH_TOKEN.to_string())
}

fn registration_error(err: CredentialError) -> AppError {
    match err {
        CredentialError::DuplicateIdentity(_) => {
            AppError::Validation(FieldErrors::single("identifier", DUPLICATE_IDENTIFIER))
        }
        CredentialError::InvalidIdentifier(message) => {
            AppError::Validation(FieldErrors::single("identifier", message))
        }
        CredentialError::InvalidCredential(message) => {
            AppError::Validation(FieldErrors::single("credential", message))
        }
        other => {
            error!(error = %other, "Registration failed");
            AppError::internal(other)
        }
    }
}
