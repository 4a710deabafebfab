//! Entry point: load config, wire dependencies, and run the server.

use std::sync::Arc;

use camwatch::auth::JwtSecret;
use camwatch::config::Config;
use camwatch::db::{self, PgStore};
use camwatch::repositories::{AlertStore, CameraDirectory, MemoryStore};
use camwatch::signaling::HttpMediaGateway;
use camwatch::{create_app, AppState, BroadcastHub};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (cameras, alerts): (Arc<dyn CameraDirectory>, Arc<dyn AlertStore>) =
        match &config.database_url {
            Some(url) => {
                let store = Arc::new(PgStore::new(db::create_pool(url).await?));
                (store.clone(), store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory camera registry");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let gateway = Arc::new(HttpMediaGateway::new(
        config.media_server_url.clone(),
        config.media_timeout,
    )?);
    let hub = Arc::new(BroadcastHub::new());

    let state = AppState::new(
        hub,
        cameras,
        alerts,
        gateway,
        JwtSecret::new(config.jwt_secret.clone()),
        config.ingest_key.clone(),
    );

    let app = create_app(state);

    tracing::info!(
        addr = %config.server_addr,
        media_server = %config.media_server_url,
        "listening"
    );
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
