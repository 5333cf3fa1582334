use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenlight::cli::Cli;
use greenlight::config::AppConfig;
use greenlight::database::{DatabaseManager, Models};
use greenlight::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up GREENLIGHT_DB_DSN etc.
    let _ = dotenvy::dotenv();

    let config = Cli::parse().into_config()?;
    init_tracing(&config);

    info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting greenlight"
    );

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open database connection pool")?;

    if config.database.auto_migrate {
        DatabaseManager::migrate(&pool)
            .await
            .context("failed to apply database migrations")?;
    }

    let models = Models::postgres(pool.clone(), config.database.query_timeout);
    let state = AppState::new(config, models);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = state
        .limiter
        .as_ref()
        .map(|limiter| limiter.spawn_sweeper(shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, environment = %state.config.environment, "starting server");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("stopping background tasks");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    pool.close().await;

    info!(%addr, "stopped server");
    Ok(())
}

/// JSON logs outside development; `RUST_LOG` overrides the default `info`
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.environment.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
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

    info!("shutting down server");
}
