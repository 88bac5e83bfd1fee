mod client;
mod config;
mod funnel;
mod gateway;
mod loader;
mod sdk;
mod server;
mod session;
mod views;

use crate::config::AppConfig;
use crate::gateway::{HttpLeadGateway, HttpTelemetrySink};
use crate::loader::{CachingConfigLoader, HttpConfigLoader};
use crate::server::AppState;
use crate::session::InMemorySessionStore;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "leadpanel", about = "Booking/lead-capture widget runtime")]
struct Args {
    /// Override BIND_ADDR.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Override BACKEND_URL.
    #[arg(long)]
    backend: Option<url::Url>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(backend) = args.backend {
        config.backend_url = backend;
    }

    let http_loader = HttpConfigLoader::new(config.backend_url.clone(), config.backend_timeout)?;
    let loader: Arc<dyn crate::loader::ConfigLoader> = Arc::new(CachingConfigLoader::new(
        Arc::new(http_loader),
        config.theme_cache_ttl,
    ));
    let sessions: Arc<dyn crate::session::SessionStore> =
        Arc::new(InMemorySessionStore::new(config.session_ttl));
    let leads: Arc<dyn crate::gateway::LeadGateway> = Arc::new(HttpLeadGateway::new(
        config.backend_url.clone(),
        config.backend_timeout,
    )?);
    let telemetry: Arc<dyn crate::gateway::TelemetrySink> = Arc::new(HttpTelemetrySink::new(
        config.backend_url.clone(),
        config.backend_timeout,
    )?);

    let addr = config.bind_addr;
    let state = AppState::new(config, loader, sessions, leads, telemetry);
    tracing::info!(%addr, "starting leadpanel server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
