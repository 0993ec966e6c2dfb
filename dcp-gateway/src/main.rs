//! DCP Signaling Gateway
//!
//! Runs the DCP multiplexer over a HUA link and reports station traffic.
//! The configuration file is the first argument, or
//! `$XDG_CONFIG_HOME/dcp-gateway/config.json` when none is given.

mod gateway;
mod settings;
mod transport;

use std::path::PathBuf;

use anyhow::Context;
use dcp_mux::DcpMux;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::Gateway;
use settings::GatewayConfig;
use transport::TransportSpec;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = GatewayConfig::load(config_path.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DCP gateway {}", config.name);
    if !config.bus.connect.is_empty() {
        tracing::info!(
            "Switching core bus: {} ({:?})",
            config.bus.connect,
            config.bus.socket
        );
    }

    let spec: TransportSpec = config
        .transport
        .parse()
        .with_context(|| format!("transport {:?}", config.transport))?;
    let link = spec
        .open(&config.interfaces)
        .await
        .with_context(|| format!("opening transport {:?}", config.transport))?;

    let (mux, events) =
        DcpMux::attach(link.stream, config.mux.clone()).context("attaching multiplexer")?;
    if let Some(filter) = &config.filter {
        tracing::info!("Station filter {} with {} entries", filter.name, filter.entries.len());
        mux.set_filter(Some(filter.build()));
    }

    let gateway = Gateway::new(mux, &config);
    gateway.start(&config.interfaces)?;

    gateway
        .run(events, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let Some(stations) = link.stations {
        stations.shutdown().await.context("stopping virtual stations")?;
    }

    tracing::info!("DCP gateway stopped");
    Ok(())
}
