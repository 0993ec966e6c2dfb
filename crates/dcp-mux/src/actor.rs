//! Multiplexer worker
//!
//! One task per transport. It owns the read half, feeds received bytes
//! through the [`HuaCodec`], and sweeps the timer queue. The loop waits on
//! incoming bytes, a wake-up, the close signal and the next timer expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::HuaCodec;
use crate::mux::{close_requested, Shared};

const READ_BUFFER: usize = 1024;

/// Control messages for the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerCommand {
    /// Re-evaluate timers; a new entry may expire sooner
    Wake,
}

async fn sleep_or_park(wait: Duration, idle: bool) {
    if idle {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(wait).await
    }
}

/// Main worker loop - runs until close is requested or the transport fails
pub(crate) async fn run_worker<R>(
    shared: Arc<Shared>,
    mut reader: R,
    mut cmd_rx: mpsc::Receiver<WorkerCommand>,
) where
    R: AsyncRead + Unpin,
{
    info!("Starting DCP mux worker");
    let mut codec = HuaCodec::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    let mut closing = shared.subscribe_close();

    loop {
        let now = Instant::now();
        let wait = shared
            .timers
            .expire(now, |handle, id| shared.engine_mut().on_timer(handle, id, now));
        let actions = shared.engine_mut().take_actions();
        shared.execute(actions).await;

        // A zero wait with entries still linked means one is already due
        let idle = wait.is_zero() && shared.timers.is_empty();

        tokio::select! {
            _ = close_requested(&mut closing) => {
                info!("Shutdown requested for DCP mux worker");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WorkerCommand::Wake) => {}
                    None => {
                        info!("Every mux handle dropped, stopping worker");
                        break;
                    }
                }
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        info!("Transport closed by peer");
                        shared.transport_lost().await;
                        break;
                    }
                    Ok(n) => {
                        debug!("Read {} bytes: {:02X?}", n, &buffer[..n]);
                        codec.push_bytes(&buffer[..n]);
                        let actions = {
                            let mut engine = shared.engine_mut();
                            let now = Instant::now();
                            while let Some(frame) = codec.next_frame() {
                                engine.on_frame(frame, now);
                            }
                            engine.take_actions()
                        };
                        shared.execute(actions).await;
                    }
                    Err(e) => {
                        warn!("Transport read error: {}", e);
                        shared.transport_lost().await;
                        break;
                    }
                }
            }

            _ = sleep_or_park(wait, idle) => {}
        }
    }

    info!("DCP mux worker ended");
}
