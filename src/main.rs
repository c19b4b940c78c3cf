use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use ecopulse::app::AppState;
use ecopulse::cli::Cli;
use ecopulse::config::EcoCfg;
use ecopulse::readiness::start_readiness_probes;
use ecopulse::store::{MetricStore, SqliteStore};
use ecopulse::{http, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = EcoCfg::load_with_overrides(cli.config.clone(), &cli.overrides())?;

    if cli.print_bind {
        println!("{}", cfg.http.bind);
        return Ok(());
    }

    telemetry::init();

    let store: Arc<dyn MetricStore> = Arc::new(SqliteStore::connect(&cfg.storage).await?);
    let state = AppState::new(cfg, store.clone())?;
    let probes = start_readiness_probes(state.cfg.clone(), store.clone(), state.ready.clone());

    let listener = TcpListener::bind(state.cfg.http.bind).await?;
    let addr = listener.local_addr()?;
    println!("listening on {}", addr);
    tracing::info!(%addr, "ecopulse starting");

    let shutdown = http::shutdown_signal(
        state.ready.clone(),
        Duration::from_millis(state.cfg.http.drain_grace_ms),
    );
    http::serve(listener, state, shutdown).await?;

    for probe in probes {
        probe.abort();
    }
    store.close().await;
    tracing::info!("ecopulse stopped");
    Ok(())
}
