//! Gateway event loop
//!
//! Brings the configured interfaces up, logs everything the multiplexer
//! reports, and greets stations as their links come up.

use std::future::Future;

use anyhow::Context;
use dcp_mux::{DcpMux, MuxEvent, TransportStatus};
use dcp_protocol::{EraseMode, MmiCommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::settings::{GatewayConfig, InterfaceSettings};

/// Owns the multiplexer for the lifetime of the process
pub struct Gateway {
    mux: DcpMux,
    name: String,
    greeting: Option<String>,
}

impl Gateway {
    pub fn new(mux: DcpMux, config: &GatewayConfig) -> Self {
        Self {
            mux,
            name: config.name.clone(),
            greeting: config.greeting.clone(),
        }
    }

    /// Register and enable every configured interface
    pub fn start(&self, interfaces: &[InterfaceSettings]) -> anyhow::Result<()> {
        for iface in interfaces {
            self.mux.ifadd(iface.id(), Some(iface.params()));
            self.mux
                .ifup(iface.id())
                .with_context(|| format!("enabling interface {}", iface.id))?;
        }
        info!("{}: {} interfaces enabled", self.name, interfaces.len());
        Ok(())
    }

    /// React to one multiplexer event
    pub async fn handle_event(&self, event: MuxEvent) {
        let status = event.transport_status();
        match event {
            MuxEvent::Event { id, event } => match status {
                Some(TransportStatus::Up) => {
                    info!("Station {} ({}) up", event.station, id);
                    self.greet(id, &event.station).await;
                }
                Some(TransportStatus::Down) => {
                    warn!("Station {} ({}) lost", event.station, id);
                }
                None => info!(
                    "{} {}: {} {}",
                    id,
                    event.station,
                    event.kind.name(),
                    event.control
                ),
            },
            MuxEvent::Command { id, command } => {
                info!(
                    "{} {}: command {} {}",
                    id,
                    command.station,
                    command.kind.name(),
                    command.control
                );
            }
        }
    }

    async fn greet(&self, id: dcp_mux::InterfaceId, station: &str) {
        let Some(text) = &self.greeting else {
            return;
        };
        let command = MmiCommand::text(station, 0, 0, EraseMode::Display, text.as_str());
        if let Err(e) = self.mux.send_command(id, &command).await {
            debug!("Greeting {} failed: {}", station, e);
        }
    }

    /// Process events until `shutdown` resolves or the stream ends, then close
    pub async fn run<F>(&self, mut events: mpsc::Receiver<MuxEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Multiplexer event stream ended");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        // Keep consuming while close tears down, so it never waits on us
        let close = self.mux.close();
        tokio::pin!(close);
        let mut closed = false;
        loop {
            tokio::select! {
                _ = &mut close, if !closed => closed = true,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None if closed => break,
                    None => {
                        (&mut close).await;
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportSpec;
    use dcp_mux::{InterfaceId, InterfaceState, MuxConfig};
    use dcp_protocol::CommandKind;
    use dcp_sim::StationReport;
    use std::time::Duration;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            greeting: Some("hello".to_string()),
            mux: MuxConfig {
                retry_interval_ms: 20,
                keepalive_interval_ms: 40,
                dead_interval_ms: 150,
                ..MuxConfig::default()
            },
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_greeting_reaches_station() {
        let config = test_config();
        let (near, far) = tokio::io::duplex(16 * 1024);
        let stations = config
            .interfaces
            .iter()
            .map(|i| dcp_sim::VirtualStation::new(i.id()))
            .collect();
        let (stations, mut reports) = dcp_sim::spawn_stations(far, stations);

        let (mux, mut events) = DcpMux::attach(near, config.mux.clone()).unwrap();
        let gateway = Gateway::new(mux, &config);
        gateway.start(&config.interfaces).unwrap();

        let mut greeted = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while greeted.len() < config.interfaces.len() {
            tokio::select! {
                Some(event) = events.recv() => gateway.handle_event(event).await,
                Some(report) = reports.recv() => {
                    if let StationReport::Command { id, command } = report {
                        assert!(matches!(
                            command.kind,
                            CommandKind::Text { ref text, .. } if text == "hello"
                        ));
                        greeted.push(id);
                    }
                }
                _ = tokio::time::sleep_until(deadline) => panic!("stations not greeted"),
            }
        }
        greeted.sort();
        assert_eq!(greeted, vec![InterfaceId(1), InterfaceId(2)]);

        gateway.mux.close().await;
        stations.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_closes_on_shutdown() {
        let config = test_config();
        let open = TransportSpec::Loopback
            .open(&config.interfaces)
            .await
            .unwrap();
        let (mux, events) = DcpMux::attach(open.stream, config.mux.clone()).unwrap();
        let gateway = Gateway::new(mux, &config);
        gateway.start(&config.interfaces).unwrap();

        gateway
            .run(events, tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(!gateway.mux.is_open());
        assert_eq!(gateway.mux.ifstate(InterfaceId(1)), InterfaceState::NotFound);
        if let Some(stations) = open.stations {
            let _ = stations.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_run_closes_with_single_slot_event_buffer() {
        let mut config = test_config();
        config.mux.event_buffer = 1;
        config.interfaces = (1..=4)
            .map(|id| InterfaceSettings {
                id,
                lcn: 1,
                hwname: None,
            })
            .collect();
        let open = TransportSpec::Loopback
            .open(&config.interfaces)
            .await
            .unwrap();
        let (mux, events) = DcpMux::attach(open.stream, config.mux.clone()).unwrap();
        let gateway = Gateway::new(mux, &config);
        gateway.start(&config.interfaces).unwrap();

        tokio::time::timeout(
            Duration::from_secs(3),
            gateway.run(events, tokio::time::sleep(Duration::from_millis(100))),
        )
        .await
        .expect("run did not return");

        assert!(!gateway.mux.is_open());
        if let Some(stations) = open.stations {
            let _ = stations.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_start_rejects_after_close() {
        let config = test_config();
        let (near, _far) = tokio::io::duplex(1024);
        let (mux, _events) = DcpMux::attach(near, config.mux.clone()).unwrap();
        mux.close().await;

        let gateway = Gateway::new(mux, &config);
        let err = gateway.start(&config.interfaces).unwrap_err();
        assert!(err.to_string().contains("enabling interface 1"));
    }
}
