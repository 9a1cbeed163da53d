use std::process::ExitCode;
use tidb_bootstrap::{bootstrap, migrate, RawConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let raw = RawConfig::from_env();
    let started = match bootstrap(&raw, &migrate::entities()).await {
        Ok(started) => started,
        Err(e) => {
            error!(category = %e.category(), "startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(descriptor = %started.database.descriptor(), "database ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");

    if let Err(e) = started.database.close().await {
        error!("error closing connection: {}", e);
    }
    ExitCode::SUCCESS
}
