use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::RegistryError,
    models::{token_hint, RefreshToken},
};

/// Tracks issued refresh tokens and their revocation state.
///
/// Entries are never deleted on revocation; `purge_expired` removes only
/// entries whose expiry has passed.
#[async_trait]
pub trait TokenRegistry {
    async fn register(&self, token: &RefreshToken) -> Result<(), RegistryError>;

    /// Atomically flips `revoked` from false to true
    async fn revoke(&self, token_id: &str) -> Result<(), RegistryError>;

    /// True iff the token exists, is not revoked and has not expired
    async fn is_valid(&self, token_id: &str) -> Result<bool, RegistryError>;

    async fn get(&self, token_id: &str) -> Result<Option<RefreshToken>, RegistryError>;

    async fn purge_expired(&self) -> Result<u64, RegistryError>;
}

/// In-memory implementation of TokenRegistry for development and testing
pub struct InMemoryTokenRegistry {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl Default for InMemoryTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of tracked tokens, revoked ones included
    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl TokenRegistry for InMemoryTokenRegistry {
    #[instrument(skip(self, token), fields(token_hint = %token.hint()))]
    async fn register(&self, token: &RefreshToken) -> Result<(), RegistryError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token_id) {
            warn!("Refresh token already registered");
            return Err(RegistryError::Storage(
                "Refresh token already registered".to_string(),
            ));
        }
        tokens.insert(token.token_id.clone(), token.clone());

        debug!(user_id = %token.subject_id, "Refresh token registered in memory");
        Ok(())
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn revoke(&self, token_id: &str) -> Result<(), RegistryError> {
        // Compare-and-set under the write guard
        let mut tokens = self.tokens.write().await;
        let token = tokens.get_mut(token_id).ok_or(RegistryError::NotFound)?;

        if token.revoked {
            debug!("Refresh token was already revoked");
            return Err(RegistryError::AlreadyRevoked);
        }
        token.revoked = true;

        info!(user_id = %token.subject_id, "Refresh token revoked");
        Ok(())
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn is_valid(&self, token_id: &str) -> Result<bool, RegistryError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(token_id)
            .is_some_and(|token| token.is_valid_at(Utc::now())))
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn get(&self, token_id: &str) -> Result<Option<RefreshToken>, RegistryError> {
        Ok(self.tokens.read().await.get(token_id).cloned())
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<u64, RegistryError> {
        let mut tokens = self.tokens.write().await;
        let now = Utc::now();
        let initial_count = tokens.len();

        tokens.retain(|_, token| !token.is_expired_at(now));

        let removed_count = initial_count - tokens.len();
        debug!(
            expired_tokens_removed = removed_count,
            "Expired refresh tokens purged from memory"
        );
        Ok(removed_count as u64)
    }
}

/// PostgreSQL implementation of the token registry.
///
/// Expects the `refresh_tokens` table from `migrations/`.
pub struct PostgresTokenRegistry {
    pool: PgPool,
}

impl PostgresTokenRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_error(context: &'static str) -> impl Fn(sqlx::Error) -> RegistryError {
    move |e| {
        warn!(error = %e, "{}", context);
        RegistryError::Storage(e.to_string())
    }
}

#[async_trait]
impl TokenRegistry for PostgresTokenRegistry {
    #[instrument(skip(self, token), fields(token_hint = %token.hint()))]
    async fn register(&self, token: &RefreshToken) -> Result<(), RegistryError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token_id, subject_id, issued_at, expires_at, revoked) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token.token_id)
        .bind(&token.subject_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to register refresh token"))?;

        debug!(user_id = %token.subject_id, "Refresh token registered in database");
        Ok(())
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn revoke(&self, token_id: &str) -> Result<(), RegistryError> {
        // The WHERE clause is the compare-and-set: only one caller can flip the flag
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_id = $1 AND revoked = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to revoke refresh token"))?;

        if result.rows_affected() == 1 {
            info!("Refresh token revoked");
            return Ok(());
        }

        let exists: bool =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE token_id = $1)")
                .bind(token_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error("Failed to look up refresh token"))?
                .get(0);

        if exists {
            debug!("Refresh token was already revoked");
            Err(RegistryError::AlreadyRevoked)
        } else {
            Err(RegistryError::NotFound)
        }
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn is_valid(&self, token_id: &str) -> Result<bool, RegistryError> {
        Ok(self
            .get(token_id)
            .await?
            .is_some_and(|token| token.is_valid_at(Utc::now())))
    }

    #[instrument(skip(self, token_id), fields(token_hint = %token_hint(token_id)))]
    async fn get(&self, token_id: &str) -> Result<Option<RefreshToken>, RegistryError> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT token_id, subject_id, issued_at, expires_at, revoked FROM refresh_tokens WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to fetch refresh token"))
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<u64, RegistryError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to purge expired refresh tokens"))?;

        let rows_affected = result.rows_affected();
        debug!(
            expired_tokens_removed = rows_affected,
            "Expired refresh tokens purged"
        );
        Ok(rows_affected)
    }
}
