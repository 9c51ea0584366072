//! Dispatcher REST API server: /run_analysis, /call_back.

use dispatch_api::server::{self, AppState};
use dispatch_engine::{Dispatcher, DispatcherConfig, StoreKind};
use dispatch_store::{FsStateStore, InMemoryStateStore, SqliteStateStore, StateStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn open_store(config: &DispatcherConfig) -> Result<Arc<dyn StateStore>, Box<dyn std::error::Error + Send + Sync>> {
    let store: Arc<dyn StateStore> = match config.store {
        StoreKind::Fs => Arc::new(FsStateStore::new(&config.scratch_root)),
        StoreKind::Memory => Arc::new(InMemoryStateStore::new()),
        StoreKind::Sqlite => Arc::new(SqliteStateStore::new(&config.sqlite_path)?),
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DispatcherConfig::from_env()?;
    let store = open_store(&config)?;
    let dispatcher = Dispatcher::from_config(store, &config);
    tracing::info!(
        store = ?config.store,
        scratch_root = %config.scratch_root.display(),
        instruments = ?dispatcher.backends().instruments(),
        "dispatcher ready"
    );

    let app = server::router(Arc::new(AppState { dispatcher }));
    tracing::info!("dispatcher API listening on {}", config.listen_addr);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen_addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
