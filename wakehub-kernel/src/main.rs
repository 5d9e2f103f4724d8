/**
 * WAKEHUB - Point d'entrée du serveur Wake-on-LAN
 *
 * RÔLE : Bootstrap : .env, logging, registre d'appareils, journal, moteur WOL, API HTTP.
 *
 * ARCHITECTURE : API REST (Axum) devant un store JSON persisté + moteur UDP bloquant.
 * Arrêt propre sur Ctrl+C.
 */

mod broadcast;
mod config;
mod http;
mod journal;
mod models;
mod ping;
mod state;
mod store;
mod validate;
mod wol;

use crate::config::load_settings;
use crate::journal::Journal;
use crate::state::AppState;
use crate::store::DeviceStore;
use crate::wol::WakeEngine;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();

    // registre des appareils (créé avec les défauts s'il n'existe pas)
    let store = DeviceStore::open(&settings.store_path)
        .with_context(|| format!("failed to open device store {}", settings.store_path.display()))?;
    info!(path = %store.path().display(), devices = store.get_all().len(), "[wakehub] device store ready");

    // journal des événements + purge périodique
    let journal = Journal::open(store.log_dir(), store.log_retention_days())
        .context("failed to open event journal")?;
    info!(dir = %journal.dir().display(), "[wakehub] event journal ready");
    journal.spawn_cleanup();

    let addr = SocketAddr::from((settings.bind, store.get_port()));
    let app = http::build_router(AppState::new(store, journal, WakeEngine::new()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[wakehub] listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("[wakehub] stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "[wakehub] cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("[wakehub] shutdown requested");
}
