use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{AuthConfig, ConfigError};
use crate::session::{self, RevocationPolicy, SessionService};
use crate::shared::AppState;
use crate::token::{InMemoryTokenRegistry, PostgresTokenRegistry, TokenIssuer, TokenRegistry};
use crate::user::{
    CredentialPolicy, CredentialStore, InMemoryUserRepository, PostgresUserRepository,
    UserRepository,
};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backing stores shared by the session service and the sweep task
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub tokens: Arc<dyn TokenRegistry + Send + Sync>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            tokens: Arc::new(InMemoryTokenRegistry::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            tokens: Arc::new(PostgresTokenRegistry::new(pool)),
        }
    }

    /// Postgres when `DATABASE_URL` is configured, in-memory otherwise
    pub async fn connect(config: &AuthConfig) -> Result<Self, StartupError> {
        match &config.database_url {
            Some(database_url) => {
                let pool = PgPool::connect(database_url).await?;
                sqlx::migrate!().run(&pool).await?;
                info!("Using PostgreSQL stores");
                Ok(Self::postgres(pool))
            }
            None => {
                info!("DATABASE_URL not set, using in-memory stores");
                Ok(Self::in_memory())
            }
        }
    }
}

pub fn build_state(config: &AuthConfig, stores: &Stores) -> AppState {
    let credentials = CredentialStore::new(
        Arc::clone(&stores.users),
        CredentialPolicy::with_min_length(config.min_credential_length),
    );
    let service = SessionService::new(
        credentials,
        TokenIssuer::new(&config.token),
        Arc::clone(&stores.tokens),
        RevocationPolicy::from_strict_flag(config.strict_revocation),
    );

    AppState::new(Arc::new(service))
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(session::current_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_access_token,
        ));

    Router::new()
        .route("/health", get(session::health))
        .route("/register", post(session::register))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/token/refresh", post(session::refresh_token))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
