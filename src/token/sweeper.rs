use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::{errors::RegistryError, registry::TokenRegistry};

/// Configuration for the registry sweep task
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often expired refresh tokens are purged
    pub sweep_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10 * 60), // 10 minutes
        }
    }
}

/// Starts the background task that periodically purges expired refresh tokens
#[instrument(skip(registry))]
pub async fn start_sweep_task(
    registry: Arc<dyn TokenRegistry + Send + Sync>,
    config: SweepConfig,
) {
    info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Starting refresh token sweep task"
    );

    let mut sweep_interval = interval(config.sweep_interval);

    loop {
        sweep_interval.tick().await;

        match sweep_expired_tokens(&registry).await {
            Ok(purged) => info!(purged_count = purged, "Refresh token sweep completed"),
            Err(e) => error!(error = %e, "Refresh token sweep failed"),
        }
    }
}

async fn sweep_expired_tokens(
    registry: &Arc<dyn TokenRegistry + Send + Sync>,
) -> Result<u64, RegistryError> {
    registry.purge_expired().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{models::refresh_token_id, InMemoryTokenRegistry, RefreshToken};
    use chrono::Utc;

    fn token(secret: &str, issued_days_ago: i64) -> RefreshToken {
        RefreshToken::new(
            refresh_token_id(secret),
            "user-1".to_string(),
            Utc::now() - chrono::Duration::days(issued_days_ago),
            chrono::Duration::days(7),
        )
    }

    #[tokio::test]
    async fn test_sweep_purges_expired_tokens() {
        let concrete = Arc::new(InMemoryTokenRegistry::new());
        let registry: Arc<dyn TokenRegistry + Send + Sync> = concrete.clone();

        registry.register(&token("old", 8)).await.unwrap();
        registry.register(&token("fresh", 0)).await.unwrap();

        let purged = sweep_expired_tokens(&registry).await.unwrap();

        assert_eq!(purged, 1);
        assert_eq!(concrete.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_with_no_tokens() {
        let registry: Arc<dyn TokenRegistry + Send + Sync> = Arc::new(InMemoryTokenRegistry::new());
        assert_eq!(sweep_expired_tokens(&registry).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_background_task_sweeps_on_interval() {
        let concrete = Arc::new(InMemoryTokenRegistry::new());
        let registry: Arc<dyn TokenRegistry + Send + Sync> = concrete.clone();
        registry.register(&token("old", 8)).await.unwrap();

        let handle = tokio::spawn(start_sweep_task(
            Arc::clone(&registry),
            SweepConfig {
                sweep_interval: Duration::from_secs(60),
            },
        ));

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(concrete.token_count().await, 0);

        handle.abort();
    }
}
