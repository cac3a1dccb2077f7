use axum::Router;
use std::sync::Arc;

use authgate::{
    app::build_router,
    config::TokenConfig,
    session::{RevocationPolicy, SessionService},
    shared::AppState,
    token::{InMemoryTokenRegistry, TokenIssuer},
    user::{CredentialHasher, CredentialPolicy, CredentialStore, InMemoryUserRepository},
};

const TEST_SIGNING_KEY: &str = "integration-test-signing-key-0123456789";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub service: Arc<SessionService>,
    pub registry: Arc<InMemoryTokenRegistry>,
    pub users: Arc<InMemoryUserRepository>,
}

pub struct TestSetupBuilder {
    policy: RevocationPolicy,
    access_ttl: chrono::Duration,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            policy: RevocationPolicy::Lenient,
            access_ttl: chrono::Duration::minutes(15),
        }
    }

    pub fn with_strict_revocation(mut self) -> Self {
        self.policy = RevocationPolicy::Strict;
        self
    }

    pub fn with_access_ttl(mut self, access_ttl: chrono::Duration) -> Self {
        self.access_ttl = access_ttl;
        self
    }

    pub fn build(self) -> TestSetup {
        let users = Arc::new(InMemoryUserRepository::new());
        let registry = Arc::new(InMemoryTokenRegistry::new());

        let token_config = TokenConfig::new(
            TEST_SIGNING_KEY.to_string(),
            self.access_ttl,
            chrono::Duration::days(7),
        )
        .unwrap();

        // Cheap hashing parameters keep the suite fast
        let credentials = CredentialStore::with_hasher(
            users.clone(),
            CredentialPolicy::default(),
            CredentialHasher::with_cost(64, 1).unwrap(),
        );

        let service = Arc::new(SessionService::new(
            credentials,
            TokenIssuer::new(&token_config),
            registry.clone(),
            self.policy,
        ));
        let app = build_router(AppState::new(service.clone()));

        TestSetup {
            app,
            service,
            registry,
            users,
        }
    }
}
