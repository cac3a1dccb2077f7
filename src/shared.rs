use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::session::service::SessionService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
}

impl AppState {
    pub fn new(session_service: Arc<SessionService>) -> Self {
        Self { session_service }
    }
}

/// Key used for errors that are not tied to a single request field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field-level validation errors, serialized as `{"field": ["message", ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an error set holding a single message for one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Returns `Ok(value)` when no errors were collected
    pub fn into_result<T>(self, value: T) -> Result<T, AppError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The payload is logged server-side and never sent to the caller
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(err: impl fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                warn!(%errors, "Rejecting request with validation errors");
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            AppError::AuthenticationFailed(detail) => {
                warn!(detail = %detail, "Authentication failed");
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            AppError::Internal(detail) => {
                let error_id = Uuid::new_v4().to_string();
                error!(error_id = %error_id, detail = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": "Internal server error",
                        "error_id": error_id,
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::config::TokenConfig;
    use crate::session::service::RevocationPolicy;
    use crate::token::{InMemoryTokenRegistry, TokenIssuer, TokenRegistry};
    use crate::user::{
        CredentialHasher, CredentialPolicy, CredentialStore, InMemoryUserRepository,
        UserRepository,
    };

    pub const TEST_SIGNING_KEY: &str = "test-signing-key-that-is-long-enough-for-hs256";

    pub fn test_token_config() -> TokenConfig {
        TokenConfig::new(
            TEST_SIGNING_KEY.to_string(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(7),
        )
        .expect("test token config is valid")
    }

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        user_repository: Option<Arc<dyn UserRepository + Send + Sync>>,
        token_registry: Option<Arc<dyn TokenRegistry + Send + Sync>>,
        policy: RevocationPolicy,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                user_repository: None,
                token_registry: None,
                policy: RevocationPolicy::Lenient,
            }
        }

        pub fn with_user_repository(mut self, repo: Arc<dyn UserRepository + Send + Sync>) -> Self {
            self.user_repository = Some(repo);
            self
        }

        pub fn with_token_registry(
            mut self,
            registry: Arc<dyn TokenRegistry + Send + Sync>,
        ) -> Self {
            self.token_registry = Some(registry);
            self
        }

        pub fn with_strict_revocation(mut self) -> Self {
            self.policy = RevocationPolicy::Strict;
            self
        }

        pub fn build_service(self) -> SessionService {
            let user_repository = self
                .user_repository
                .unwrap_or_else(|| Arc::new(InMemoryUserRepository::new()));
            let token_registry = self
                .token_registry
                .unwrap_or_else(|| Arc::new(InMemoryTokenRegistry::new()));

            SessionService::new(
                CredentialStore::with_hasher(
                    user_repository,
                    CredentialPolicy::default(),
                    CredentialHasher::with_cost(64, 1).expect("test hasher parameters are valid"),
                ),
                TokenIssuer::new(&test_token_config()),
                token_registry,
                self.policy,
            )
        }

        pub fn build(self) -> AppState {
            AppState::new(Arc::new(self.build_service()))
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("identifier", "This field is required.");
        errors.add("identifier", "Too long.");
        errors.add("credential", "Too short.");

        assert_eq!(errors.get("identifier").map(|m| m.len()), Some(2));
        assert_eq!(errors.get("credential").map(|m| m.len()), Some(1));

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["credential"][0], "Too short.");
    }

    #[test]
    fn test_empty_field_errors_pass_through() {
        let result = FieldErrors::new().into_result(42);
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_internal_error_does_not_leak_detail() {
        let response = AppError::Internal("db password is hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["detail"], "Internal server error");
        assert!(json["error_id"].as_str().is_some());
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_authentication_failed_maps_to_401() {
        let response = AppError::AuthenticationFailed("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
