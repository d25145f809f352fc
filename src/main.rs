use backoffice_api::{config, database::DatabaseManager, is_development, services::permission_service};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    config.validate()?;
    tracing::info!("Starting back-office API in {:?} mode", config.environment);
    if is_development!() {
        tracing::warn!("Development mode: default JWT secret allowed, emails are logged");
    }

    if std::env::var("AUTO_MIGRATE").is_ok_and(|v| v == "true" || v == "1") {
        prepare_database().await?;
    }

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Back-office API listening on http://{}", bind_addr);

    axum::serve(listener, backoffice_api::app())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close().await;
    Ok(())
}

/// Schema migrations plus the module catalog, both idempotent
async fn prepare_database() -> anyhow::Result<()> {
    DatabaseManager::migrate().await?;
    let pool = DatabaseManager::pool()?;
    let mut conn = DatabaseManager::acquire(&pool).await?;
    permission_service::seed_catalog(&mut conn).await?;
    tracing::info!("Module catalog seeded");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
