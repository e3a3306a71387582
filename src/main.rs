use std::sync::Arc;

use anyhow::{Context, Result};
use leak_lab::{
    build_router,
    config::{AppConfig, DatabaseBackend},
    jobs::spawn_background_writer,
    leak::LeakStore,
    repository::{InMemoryItemRepository, ItemRepository, PgItemRepository},
    snapshot::SnapshotCapturer,
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load application configuration")?;

    let repository: Arc<dyn ItemRepository> = match config.database_backend {
        DatabaseBackend::Postgres => {
            info!("database backend: postgres");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect_lazy(&config.database_url)
                .context("invalid DATABASE_URL")?;
            Arc::new(PgItemRepository::new(pool))
        }
        DatabaseBackend::Memory => {
            info!("database backend: memory");
            Arc::new(InMemoryItemRepository::new())
        }
    };

    // An unreachable database must not keep the leak endpoints down.
    match repository.init().await {
        Ok(()) => info!("connected to item store"),
        Err(err) => error!(error = %err, "could not initialize item store"),
    }

    let snapshots = SnapshotCapturer::detect();
    info!(profiler = snapshots.profiler_name(), "heap profiler selected");

    let background = config
        .background_interval
        .map(|every| spawn_background_writer(Arc::clone(&repository), every));

    let app = build_router(AppState::new(
        repository,
        Arc::new(LeakStore::new()),
        snapshots,
    ));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = background {
        handle.abort();
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("leak_lab=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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
}
