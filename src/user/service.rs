use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::CredentialError,
    models::UserIdentity,
    password::{validate_identifier, CredentialHasher, CredentialPolicy},
    repository::UserRepository,
};

/// Holds user identities and verifies submitted credentials against stored hashes
pub struct CredentialStore {
    repository: Arc<dyn UserRepository + Send + Sync>,
    policy: CredentialPolicy,
    hasher: CredentialHasher,
}

impl CredentialStore {
    pub fn new(repository: Arc<dyn UserRepository + Send + Sync>, policy: CredentialPolicy) -> Self {
        Self::with_hasher(repository, policy, CredentialHasher::new())
    }

    pub fn with_hasher(
        repository: Arc<dyn UserRepository + Send + Sync>,
        policy: CredentialPolicy,
        hasher: CredentialHasher,
    ) -> Self {
        Self {
            repository,
            policy,
            hasher,
        }
    }

    /// Creates a credential record for a new identifier
    #[instrument(skip(self, raw_credential))]
    pub async fn register(
        &self,
        identifier: &str,
        raw_credential: &str,
    ) -> Result<UserIdentity, CredentialError> {
        validate_identifier(identifier)?;
        self.policy.check(identifier, raw_credential)?;

        // Fail fast on the common case; the repository still enforces uniqueness atomically
        if self.repository.find_by_identifier(identifier).await?.is_some() {
            warn!(identifier = %identifier, "Registration rejected: identifier taken");
            return Err(CredentialError::DuplicateIdentity(identifier.to_string()));
        }

        let credential_hash = self
            .hasher
            .hash_blocking(raw_credential.to_string())
            .await?;
        let user = UserIdentity::new(identifier.to_string(), credential_hash);
        self.repository.insert_user(&user).await?;

        info!(user_id = %user.id, identifier = %identifier, "User registered");
        Ok(user)
    }

    /// Returns the identity whose stored hash matches the submitted credential
    #[instrument(skip(self, raw_credential))]
    pub async fn verify(
        &self,
        identifier: &str,
        raw_credential: &str,
    ) -> Result<UserIdentity, CredentialError> {
        let user = match self.repository.find_by_identifier(identifier).await? {
            Some(user) => user,
            None => {
                // Spend the same hashing work as a real verification
                if let Err(e) = self.hasher.hash_blocking(raw_credential.to_string()).await {
                    warn!(error = %e, "Equalizing hash failed");
                }
                debug!(identifier = %identifier, "No account for identifier");
                return Err(CredentialError::NotFound);
            }
        };

        let matches = self
            .hasher
            .verify_blocking(raw_credential.to_string(), user.credential_hash.clone())
            .await?;

        if matches {
            debug!(user_id = %user.id, "Credential verified");
            Ok(user)
        } else {
            debug!(user_id = %user.id, "Credential mismatch");
            Err(CredentialError::CredentialMismatch)
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, CredentialError> {
        self.repository.find_by_id(id).await
    }
}
