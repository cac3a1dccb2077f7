use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{errors::CredentialError, models::UserIdentity};

/// Trait for user identity persistence.
///
/// `insert_user` must enforce identifier uniqueness atomically.
#[async_trait]
pub trait UserRepository {
    async fn insert_user(&self, user: &UserIdentity) -> Result<(), CredentialError>;
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserIdentity>, CredentialError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, CredentialError>;
}

#[derive(Default)]
struct UserTable {
    by_identifier: HashMap<String, UserIdentity>,
    identifier_by_id: HashMap<String, String>,
}

/// In-memory implementation of UserRepository for development and testing
///
/// Data is stored in memory and will be lost when the application restarts.
pub struct InMemoryUserRepository {
    users: RwLock<UserTable>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(UserTable::default()),
        }
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.by_identifier.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &UserIdentity) -> Result<(), CredentialError> {
        // Check and insert under a single write guard
        let mut users = self.users.write().await;
        if users.by_identifier.contains_key(&user.identifier) {
            warn!(identifier = %user.identifier, "Identifier already registered in memory");
            return Err(CredentialError::DuplicateIdentity(user.identifier.clone()));
        }

        users
            .identifier_by_id
            .insert(user.id.clone(), user.identifier.clone());
        users
            .by_identifier
            .insert(user.identifier.clone(), user.clone());

        debug!(identifier = %user.identifier, "User stored in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserIdentity>, CredentialError> {
        let users = self.users.read().await;
        Ok(users.by_identifier.get(identifier).cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, CredentialError> {
        let users = self.users.read().await;
        Ok(users
            .identifier_by_id
            .get(id)
            .and_then(|identifier| users.by_identifier.get(identifier))
            .cloned())
    }
}

/// PostgreSQL implementation of the user repository.
///
/// Expects the `users` table from `migrations/`, whose UNIQUE constraint on
/// `identifier` provides the atomic uniqueness check.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &UserIdentity) -> Result<(), CredentialError> {
        debug!(identifier = %user.identifier, "Inserting user into database");

        sqlx::query(
            "INSERT INTO users (id, identifier, credential_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&user.id)
        .bind(&user.identifier)
        .bind(&user.credential_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                warn!(identifier = %user.identifier, "Identifier already registered");
                CredentialError::DuplicateIdentity(user.identifier.clone())
            }
            other => {
                warn!(error = %other, "Failed to insert user");
                CredentialError::Storage(other.to_string())
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserIdentity>, CredentialError> {
        sqlx::query_as::<_, UserIdentity>(
            "SELECT id, identifier, credential_hash, created_at FROM users WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user by identifier");
            CredentialError::Storage(e.to_string())
        })
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, CredentialError> {
        sqlx::query_as::<_, UserIdentity>(
            "SELECT id, identifier, credential_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user by id");
            CredentialError::Storage(e.to_string())
        })
    }
}
