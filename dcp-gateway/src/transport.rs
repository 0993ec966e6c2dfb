//! Transport connect strings
//!
//! The gateway reaches the HUA link through one of:
//!
//! - `tcp:host:port`: a TCP connection to a link concentrator
//! - `serial:path[@baud]`: a serial line, 9600 baud unless given
//! - `loopback`: an in-memory pipe to virtual stations

use std::str::FromStr;

use dcp_sim::{spawn_stations, StationHandle, StationReport, VirtualStation, VirtualStationConfig};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::settings::InterfaceSettings;

/// Default serial baud rate
pub const DEFAULT_BAUD: u32 = 9600;

const LOOPBACK_BUFFER: usize = 64 * 1024;

/// Byte stream the multiplexer can own
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Errors parsing a connect string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportSpecError {
    #[error("unknown transport scheme in {0:?}")]
    UnknownScheme(String),

    #[error("missing port in {0:?}")]
    MissingPort(String),

    #[error("invalid port in {0:?}")]
    InvalidPort(String),

    #[error("invalid baud rate in {0:?}")]
    InvalidBaud(String),

    #[error("empty {0} in transport string")]
    Empty(&'static str),
}

/// Parsed transport connect string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    Tcp { host: String, port: u16 },
    Serial { path: String, baud: u32 },
    Loopback,
}

impl FromStr for TransportSpec {
    type Err = TransportSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "loopback" {
            return Ok(TransportSpec::Loopback);
        }

        if let Some(rest) = s.strip_prefix("tcp:") {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| TransportSpecError::MissingPort(s.to_string()))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(TransportSpecError::Empty("host"));
            }
            let port = port
                .parse()
                .map_err(|_| TransportSpecError::InvalidPort(s.to_string()))?;
            return Ok(TransportSpec::Tcp {
                host: host.to_string(),
                port,
            });
        }

        if let Some(rest) = s.strip_prefix("serial:") {
            let (path, baud) = match rest.rsplit_once('@') {
                Some((path, baud)) => (
                    path,
                    baud.parse()
                        .map_err(|_| TransportSpecError::InvalidBaud(s.to_string()))?,
                ),
                None => (rest, DEFAULT_BAUD),
            };
            if path.is_empty() {
                return Err(TransportSpecError::Empty("serial path"));
            }
            return Ok(TransportSpec::Serial {
                path: path.to_string(),
                baud,
            });
        }

        Err(TransportSpecError::UnknownScheme(s.to_string()))
    }
}

/// An opened transport, plus the virtual stations behind it in loopback mode
pub struct OpenTransport {
    pub stream: Box<dyn Transport>,
    pub stations: Option<StationHandle>,
}

impl TransportSpec {
    /// Connect to the link
    pub async fn open(&self, interfaces: &[InterfaceSettings]) -> std::io::Result<OpenTransport> {
        match self {
            TransportSpec::Tcp { host, port } => {
                info!("Connecting to HUA link at {}:{}", host, port);
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                Ok(OpenTransport {
                    stream: Box::new(stream),
                    stations: None,
                })
            }
            TransportSpec::Serial { path, baud } => {
                info!("Opening HUA link on {} at {} baud", path, baud);
                let stream = tokio_serial::new(path, *baud).open_native_async()?;
                Ok(OpenTransport {
                    stream: Box::new(stream),
                    stations: None,
                })
            }
            TransportSpec::Loopback => {
                info!("Using loopback link with {} virtual stations", interfaces.len());
                let (near, far) = tokio::io::duplex(LOOPBACK_BUFFER);
                let stations = interfaces
                    .iter()
                    .map(|iface| {
                        let mut config = VirtualStationConfig::new(iface.id());
                        config.lcn = iface.lcn;
                        if let Some(hwname) = &iface.hwname {
                            config.name = hwname.clone();
                        }
                        VirtualStation::from_config(config)
                    })
                    .collect();
                let (handle, reports) = spawn_stations(far, stations);
                tokio::spawn(log_station_reports(reports));
                Ok(OpenTransport {
                    stream: Box::new(near),
                    stations: Some(handle),
                })
            }
        }
    }
}

async fn log_station_reports(mut reports: mpsc::UnboundedReceiver<StationReport>) {
    while let Some(report) = reports.recv().await {
        match report {
            StationReport::Frame(frame) => {
                debug!("Virtual station rx {:?} on {}", frame.kind, frame.id)
            }
            StationReport::LinkUp { id } => info!("Virtual station {} linked", id),
            StationReport::LinkDown { id } => info!("Virtual station {} unlinked", id),
            StationReport::Command { id, command } => info!(
                "Virtual station {} applied {} on {:?}",
                id,
                command.kind.name(),
                command.control
            ),
        }
    }
}
