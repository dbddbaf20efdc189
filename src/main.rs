use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use prompt_gallery::{
    catalog::Catalog,
    config::AppConfig,
    keystore::{KeyStore, LocalFileVault},
    web_api::{AppState, router},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("startup configuration")?;
    let catalog = Catalog::load_embedded().context("prompt catalog")?;
    tracing::info!(templates = catalog.len(), "catalog loaded");

    let vault = Arc::new(LocalFileVault::new(config.data_dir.clone()));
    let keystore = Arc::new(KeyStore::new(vault, config.obfuscation_passphrase.clone()));

    let bind_address = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        catalog: Arc::new(catalog),
        keystore,
        config: Arc::new(config),
    };
    let app = router(state);

    let tcp_listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("bind {bind_address}"))?;
    tracing::info!("prompt-gallery listening on http://{bind_address}");

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
