// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use donation_server::{
    api::{cors_layer, router},
    auth::TokenService,
    config::{
        AppConfig, StoreBackend, DEFAULT_LOG_FILTER, FRONTEND_URL_ENV, LOG_FORMAT_ENV,
        STORE_CONNECT_TIMEOUT,
    },
    state::AppState,
    storage::{Database, DocumentStore, MemoryStore, RedbStore, StoreError, COLLECTIONS},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json_logs = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Open the configured backend. Opening redb is bounded by
/// [`STORE_CONNECT_TIMEOUT`].
async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn DocumentStore>, BoxError> {
    match backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new(COLLECTIONS)))
        }
        StoreBackend::Redb(path) => {
            let path = path.clone();
            let path_display = path.display().to_string();
            let open = tokio::task::spawn_blocking(move || RedbStore::open(&path, COLLECTIONS));
            let store = tokio::time::timeout(STORE_CONNECT_TIMEOUT, open)
                .await
                .map_err(|_| StoreError::Timeout {
                    operation: "open",
                    timeout: STORE_CONNECT_TIMEOUT,
                })?
                .map_err(|e| StoreError::Task(e.to_string()))??;
            info!(path = %path_display, "Opened redb store");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;

    let origin = HeaderValue::from_str(&config.frontend_url).map_err(|_| {
        error!(value = %config.frontend_url, "{FRONTEND_URL_ENV} is not a valid origin");
        format!("invalid {FRONTEND_URL_ENV}: {}", config.frontend_url)
    })?;

    let store = open_store(&config.store)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to open store"))?;
    let db = Database::new(store, config.store_timeout);
    let state = AppState::new(db, TokenService::new(&config.jwt_secret));
    let app = router(state, cors_layer(origin));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        frontend = %config.frontend_url,
        "Donation server listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
