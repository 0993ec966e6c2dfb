//! Virtual station actor task
//!
//! This module provides an async task that owns a set of
//! [`VirtualStation`]s sharing one link stream. The task uses a select!
//! loop to:
//! - Read HUA frames from the stream and route them to stations by id
//! - Handle control commands (inject events, go silent, shut down)
//! - Report link changes, received commands and raw frames

use std::collections::BTreeMap;
use std::io;

use dcp_mux::{HuaCodec, HuaFrame, InterfaceId};
use dcp_protocol::{MmiCommand, MmiEvent};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::station::{StationUpdate, VirtualStation};

/// Commands that can be sent to a station task
#[derive(Debug, Clone)]
pub enum StationCommand {
    /// Send an arbitrary event from a station
    Inject { id: InterfaceId, event: MmiEvent },
    /// Press and release a button
    PressKey { id: InterfaceId, control: String },
    /// Dial digits
    Dial { id: InterfaceId, digits: String },
    /// Lift or replace the handset
    Hook { id: InterfaceId, off_hook: bool },
    /// Stop or resume answering probes
    SetAnswerProbes { id: InterfaceId, answer: bool },
    /// Start training from the station side
    Probe { id: InterfaceId },
    /// Tear the link down from the station side
    Disconnect { id: InterfaceId },
    /// Shutdown the station task
    Shutdown,
}

/// Report emitted by a station task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationReport {
    /// A frame arrived from the switch
    Frame(HuaFrame),
    /// A station's link came up
    LinkUp { id: InterfaceId },
    /// The switch tore a station's link down
    LinkDown { id: InterfaceId },
    /// A station received a complete command
    Command { id: InterfaceId, command: MmiCommand },
}

/// Run the station task
///
/// Frames for ids without a station are logged and dropped. The task ends
/// on shutdown, when the command channel closes, or when the stream does.
pub async fn run_station_task<S>(
    mut stream: S,
    stations: Vec<VirtualStation>,
    mut cmd_rx: mpsc::Receiver<StationCommand>,
    report_tx: mpsc::UnboundedSender<StationReport>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stations: BTreeMap<InterfaceId, VirtualStation> =
        stations.into_iter().map(|s| (s.id(), s)).collect();
    let mut codec = HuaCodec::new();
    let mut buf = [0u8; 1024];

    info!("Starting virtual station task with {} stations", stations.len());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual station stream closed");
                        break;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some(frame) = codec.next_frame() {
                            let _ = report_tx.send(StationReport::Frame(frame.clone()));
                            let Some(station) = stations.get_mut(&frame.id) else {
                                warn!("No virtual station for interface {}", frame.id);
                                continue;
                            };
                            let report = match station.handle_frame(&frame) {
                                Some(StationUpdate::LinkUp) => Some(StationReport::LinkUp { id: frame.id }),
                                Some(StationUpdate::LinkDown) => Some(StationReport::LinkDown { id: frame.id }),
                                Some(StationUpdate::Command(command)) => {
                                    Some(StationReport::Command { id: frame.id, command })
                                }
                                None => None,
                            };
                            if let Some(report) = report {
                                let _ = report_tx.send(report);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Virtual station read error: {}", e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(StationCommand::Shutdown) | None => {
                        info!("Virtual station task shutting down");
                        break;
                    }
                    Some(cmd) => apply_command(&mut stations, cmd),
                }
            }
        }

        flush_output(&mut stream, &mut stations).await?;
    }

    Ok(())
}

fn apply_command(stations: &mut BTreeMap<InterfaceId, VirtualStation>, cmd: StationCommand) {
    let id = match &cmd {
        StationCommand::Inject { id, .. }
        | StationCommand::PressKey { id, .. }
        | StationCommand::Dial { id, .. }
        | StationCommand::Hook { id, .. }
        | StationCommand::SetAnswerProbes { id, .. }
        | StationCommand::Probe { id }
        | StationCommand::Disconnect { id } => *id,
        StationCommand::Shutdown => return,
    };
    let Some(station) = stations.get_mut(&id) else {
        warn!("No virtual station for interface {}", id);
        return;
    };

    match cmd {
        StationCommand::Inject { event, .. } => {
            if let Err(e) = station.inject(&event) {
                warn!("{}: cannot inject event: {}", station.name(), e);
            }
        }
        StationCommand::PressKey { control, .. } => station.press_key(&control),
        StationCommand::Dial { digits, .. } => station.dial(&digits),
        StationCommand::Hook { off_hook: true, .. } => station.go_off_hook(),
        StationCommand::Hook { off_hook: false, .. } => station.go_on_hook(),
        StationCommand::SetAnswerProbes { answer, .. } => station.set_answer_probes(answer),
        StationCommand::Probe { .. } => station.probe(),
        StationCommand::Disconnect { .. } => station.disconnect(),
        StationCommand::Shutdown => {}
    }
}

async fn flush_output<S>(stream: &mut S, stations: &mut BTreeMap<InterfaceId, VirtualStation>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut wrote = false;
    for station in stations.values_mut() {
        while let Some(frame) = station.take_output() {
            stream.write_all(&frame.encode()).await?;
            wrote = true;
        }
    }
    if wrote {
        stream.flush().await?;
    }
    Ok(())
}

/// Handle to a spawned station task
#[derive(Debug)]
pub struct StationHandle {
    cmd_tx: mpsc::Sender<StationCommand>,
    task: JoinHandle<io::Result<()>>,
}

/// Spawn a station task on the current runtime
pub fn spawn_stations<S>(
    stream: S,
    stations: Vec<VirtualStation>,
) -> (StationHandle, mpsc::UnboundedReceiver<StationReport>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_station_task(stream, stations, cmd_rx, report_tx));
    (StationHandle { cmd_tx, task }, report_rx)
}

impl StationHandle {
    /// Send a command; false if the task has ended
    pub async fn send(&self, cmd: StationCommand) -> bool {
        self.cmd_tx.send(cmd).await.is_ok()
    }

    /// Inject an event from a station
    pub async fn inject(&self, id: InterfaceId, event: MmiEvent) -> bool {
        self.send(StationCommand::Inject { id, event }).await
    }

    /// Stop the task and wait for it
    pub async fn shutdown(self) -> io::Result<()> {
        let _ = self.cmd_tx.send(StationCommand::Shutdown).await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}
