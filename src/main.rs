// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use gatekeep::{
    api::router,
    config::{AppConfig, LOG_FORMAT_ENV},
    logging::{self, LogFormat},
    state::AppState,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Logging comes up before config so config errors are reported.
    let log_format = std::env::var(LOG_FORMAT_ENV)
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    logging::init(log_format);

    if let Err(err) = run().await {
        tracing::error!(error = %err, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    tracing::info!(
        environment = %config.environment,
        scheme = ?state.tokens.scheme(),
        ttl_secs = state.tokens.ttl().num_seconds(),
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window.as_secs(),
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();
    let sweeper = state.limiter.clone().spawn_sweeper(shutdown.clone());

    let app = router(state)?;
    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Gatekeep listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    sweeper.await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
