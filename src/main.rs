use authgate::{
    app::{build_router, build_state, StartupError, Stores},
    config::AuthConfig,
    token::{start_sweep_task, SweepConfig},
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "authgate failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    info!("Starting authgate");

    let config = AuthConfig::from_env()?;
    let stores = Stores::connect(&config).await?;

    tokio::spawn(start_sweep_task(
        stores.tokens.clone(),
        SweepConfig {
            sweep_interval: config.sweep_interval,
        },
    ));

    let app = build_router(build_state(&config, &stores));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        bind_addr = %config.bind_addr,
        strict_revocation = config.strict_revocation,
        "Server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
