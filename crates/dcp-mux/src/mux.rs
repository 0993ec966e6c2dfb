//! Public multiplexer handle
//!
//! [`DcpMux::attach`] takes ownership of a byte-stream transport, spawns
//! the worker task and hands back a cheap clonable handle plus the event
//! receiver.
//!
//! # Locking
//!
//! - The interface table sits behind a `std::sync::RwLock` that is never
//!   held across an `.await`; engine calls queue actions which are executed
//!   after the guard is gone.
//! - The transport writer sits behind an async mutex taken once per frame.
//! - Each interface has its own async transmit lock held for a whole train,
//!   so blocks of two trains on one interface never interleave while
//!   trains on different interfaces may.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use dcp_protocol::{event_to_dcp, mmi_to_dcp, MmiCommand, MmiEvent, Train};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::actor::{run_worker, WorkerCommand};
use crate::codec::HuaFrame;
use crate::engine::{Action, Engine, MuxConfig};
use crate::error::MuxError;
use crate::events::MuxEvent;
use crate::filter::Filter;
use crate::state::{InterfaceId, InterfaceParams, InterfaceState};
use crate::timer::TimerQueue;

const WORKER_QUEUE: usize = 8;

/// How long `close` lets a slow consumer take undelivered events
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// State shared between the handle and the worker
pub(crate) struct Shared {
    engine: RwLock<Engine>,
    pub(crate) timers: Arc<TimerQueue<InterfaceId>>,
    writer: AsyncMutex<Option<BoxedWriter>>,
    event_tx: Mutex<Option<mpsc::Sender<MuxEvent>>>,
    transport_open: AtomicBool,
    closed: AtomicBool,
    /// Set by `close`: the deadline for delivering pending events
    closing: watch::Sender<Option<Instant>>,
}

/// Resolves once `close` has started
pub(crate) async fn close_requested(rx: &mut watch::Receiver<Option<Instant>>) {
    let _ = rx.wait_for(Option::is_some).await;
}

async fn close_deadline(mut rx: watch::Receiver<Option<Instant>>) {
    let deadline = match rx.wait_for(Option::is_some).await {
        Ok(deadline) => *deadline,
        Err(_) => None,
    };
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

impl Shared {
    pub(crate) fn engine(&self) -> RwLockReadGuard<'_, Engine> {
        self.engine.read().expect("interface table lock poisoned")
    }

    pub(crate) fn engine_mut(&self) -> RwLockWriteGuard<'_, Engine> {
        self.engine.write().expect("interface table lock poisoned")
    }

    fn is_open(&self) -> bool {
        self.transport_open.load(Ordering::SeqCst)
    }

    /// Write one frame to the transport
    async fn transmit(&self, frame: &HuaFrame) -> io::Result<()> {
        let bytes = frame.encode();
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport closed",
            ));
        };
        writer.write_all(&bytes).await?;
        writer.flush().await
    }

    pub(crate) fn subscribe_close(&self) -> watch::Receiver<Option<Instant>> {
        self.closing.subscribe()
    }

    /// Deliver an event, waiting for channel space until the close deadline
    async fn emit(&self, event: MuxEvent) {
        let event_tx = self.event_tx.lock().expect("event sender lock poisoned").clone();
        let Some(tx) = event_tx else {
            debug!("Mux closed, discarding event");
            return;
        };

        let id = event.interface();
        tokio::select! {
            biased;
            result = tx.send(event) => {
                if result.is_err() {
                    debug!("Event receiver dropped, discarding event");
                }
            }
            _ = close_deadline(self.subscribe_close()) => {
                warn!("Event receiver not draining, dropping event for interface {} on close", id);
            }
        }
    }

    /// Run engine actions; a failed write takes its interface down
    pub(crate) async fn execute(&self, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Emit(event) => self.emit(event).await,
                Action::Transmit(frame) => {
                    if let Err(e) = self.transmit(&frame).await {
                        warn!(
                            "Failed to write {:?} frame for interface {}: {}",
                            frame.kind, frame.id, e
                        );
                        let follow = {
                            let mut engine = self.engine_mut();
                            engine.write_failed(frame.id);
                            engine.take_actions()
                        };
                        queue.extend(follow);
                    }
                }
            }
        }
    }

    /// The read side failed or hit EOF
    pub(crate) async fn transport_lost(&self) {
        self.transport_open.store(false, Ordering::SeqCst);
        let actions = {
            let mut engine = self.engine_mut();
            engine.transport_lost();
            engine.take_actions()
        };
        self.writer.lock().await.take();
        self.execute(actions).await;
    }

    async fn shutdown_transport(&self) {
        self.transport_open.store(false, Ordering::SeqCst);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Transport shutdown: {}", e);
            }
        }
    }
}

/// Handle to a multiplexer attached to one transport
///
/// Clones share the same multiplexer. When every handle is dropped
/// without [`close`](Self::close), the worker stops but interfaces are
/// not torn down.
#[derive(Clone)]
pub struct DcpMux {
    shared: Arc<Shared>,
    worker_tx: mpsc::Sender<WorkerCommand>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DcpMux {
    /// Attach a multiplexer to a transport
    ///
    /// Must be called from within a Tokio runtime; the worker task is
    /// spawned on it.
    pub fn attach<T>(
        transport: T,
        config: MuxConfig,
    ) -> Result<(Self, mpsc::Receiver<MuxEvent>), MuxError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| MuxError::NoRuntime)?;

        let (reader, writer) = tokio::io::split(transport);
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (worker_tx, worker_rx) = mpsc::channel(WORKER_QUEUE);
        let timers = Arc::new(TimerQueue::new());

        let shared = Arc::new(Shared {
            engine: RwLock::new(Engine::new(config, timers.clone())),
            timers,
            writer: AsyncMutex::new(Some(Box::new(writer))),
            event_tx: Mutex::new(Some(event_tx)),
            transport_open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            closing: watch::channel(None).0,
        });

        let worker = runtime.spawn(run_worker(shared.clone(), reader, worker_rx));
        info!("DCP mux attached");

        Ok((
            Self {
                shared,
                worker_tx,
                worker: Arc::new(Mutex::new(Some(worker))),
            },
            event_rx,
        ))
    }

    /// Register an interface, or update an existing one's parameters
    ///
    /// New interfaces start inactive and ineligible for training.
    pub fn ifadd(&self, id: InterfaceId, params: Option<InterfaceParams>) {
        self.shared.engine_mut().add(id, params);
    }

    /// Make an interface eligible; training starts immediately
    pub fn ifup(&self, id: InterfaceId) -> Result<(), MuxError> {
        if !self.shared.is_open() {
            return Err(MuxError::TransportClosed);
        }
        let armed = self.shared.engine_mut().up(id, Instant::now())?;
        if armed {
            // A full queue already holds a wake
            let _ = self.worker_tx.try_send(WorkerCommand::Wake);
        }
        Ok(())
    }

    /// Make an interface ineligible, tearing down a running link
    pub async fn ifdown(&self, id: InterfaceId) -> Result<(), MuxError> {
        let actions = {
            let mut engine = self.shared.engine_mut();
            engine.down(id)?;
            engine.take_actions()
        };
        self.shared.execute(actions).await;
        Ok(())
    }

    /// Remove an interface
    pub async fn ifdel(&self, id: InterfaceId) -> Result<(), MuxError> {
        let actions = {
            let mut engine = self.shared.engine_mut();
            engine.remove(id)?;
            engine.take_actions()
        };
        self.shared.execute(actions).await;
        Ok(())
    }

    /// Current state of an interface
    pub fn ifstate(&self, id: InterfaceId) -> InterfaceState {
        self.shared.engine().state(id)
    }

    /// Every registered interface with its state, ordered by id
    pub fn interfaces(&self) -> Vec<(InterfaceId, InterfaceState)> {
        self.shared.engine().list()
    }

    /// Interface registered under a hardware name
    pub fn lookup_hwname(&self, hwname: &str) -> Option<InterfaceId> {
        self.shared.engine().lookup_hwname(hwname)
    }

    /// Install or remove the station filter
    pub fn set_filter(&self, filter: Option<Arc<Filter>>) {
        if let Some(filter) = &filter {
            info!("Using filter {}", filter.name());
        }
        self.shared.engine_mut().set_filter(filter);
    }

    /// Currently installed filter
    pub fn filter(&self) -> Option<Arc<Filter>> {
        self.shared.engine().filter()
    }

    /// Whether the transport is still usable
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Send an already-encoded message on a running interface
    ///
    /// `is_command` marks the train as a command (towards a station) rather
    /// than an event.
    pub async fn send(&self, id: InterfaceId, is_command: bool, data: &[u8]) -> Result<(), MuxError> {
        self.send_train(id, is_command, &Train::new(data.to_vec()))
            .await
    }

    /// Encode and send a command, subject to the filter
    pub async fn send_command(&self, id: InterfaceId, command: &MmiCommand) -> Result<(), MuxError> {
        self.shared.engine().check_command(id)?;
        let train = mmi_to_dcp(command)?;
        debug!("Sending {} command on interface {}", command.kind.name(), id);
        self.send_train(id, true, &train).await
    }

    /// Encode and send a station event
    pub async fn send_event(&self, id: InterfaceId, event: &MmiEvent) -> Result<(), MuxError> {
        let train = event_to_dcp(event)?;
        debug!("Sending {} event on interface {}", event.kind.name(), id);
        self.send_train(id, false, &train).await
    }

    async fn send_train(&self, id: InterfaceId, is_command: bool, train: &Train) -> Result<(), MuxError> {
        if train.is_empty() {
            return Err(MuxError::EmptyMessage);
        }
        if !self.shared.is_open() {
            return Err(MuxError::TransportClosed);
        }

        let tx_lock = self.shared.engine().check_send(id)?;
        let _train = tx_lock.lock().await;
        // The link may have gone down while waiting for the previous train
        self.shared.engine().check_send(id)?;

        for block in train.blocks() {
            let frame = HuaFrame::data(id, is_command, block.more, block.payload.to_vec());
            if let Err(e) = self.shared.transmit(&frame).await {
                if !self.shared.is_open() {
                    return Err(MuxError::TransportClosed);
                }
                warn!("Write failed on interface {}: {}", id, e);
                let actions = {
                    let mut engine = self.shared.engine_mut();
                    engine.write_failed(id);
                    engine.take_actions()
                };
                self.shared.execute(actions).await;
                return Err(MuxError::Io(e));
            }
        }

        debug!(
            "Sent {} byte train in {} blocks on interface {}",
            train.len(),
            train.block_count(),
            id
        );
        Ok(())
    }

    /// Stop the worker, remove every interface and release the transport
    ///
    /// Running interfaces get a final lost event, after which the event
    /// channel ends. Calling `close` again does nothing.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Wakes the worker even when it is blocked delivering an event
        let deadline = Instant::now() + CLOSE_GRACE;
        self.shared.closing.send_replace(Some(deadline));

        let worker = self.worker.lock().expect("worker handle lock poisoned").take();
        if let Some(mut worker) = worker {
            match tokio::time::timeout_at(deadline + CLOSE_GRACE, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("DCP mux worker ended abnormally: {}", e),
                Err(_) => {
                    warn!("DCP mux worker did not stop in {:?}, aborting", CLOSE_GRACE * 2);
                    worker.abort();
                }
            }
        }

        // Teardown events get their own grace period
        self.shared
            .closing
            .send_replace(Some(Instant::now() + CLOSE_GRACE));
        let actions = {
            let mut engine = self.shared.engine_mut();
            engine.teardown();
            engine.take_actions()
        };
        self.shared.execute(actions).await;
        self.shared.shutdown_transport().await;
        // Ends the owner's event stream
        self.shared.event_tx.lock().expect("event sender lock poisoned").take();
        info!("DCP mux closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_requires_runtime() {
        let (near, _far) = tokio::io::duplex(64);
        assert!(matches!(
            DcpMux::attach(near, MuxConfig::default()),
            Err(MuxError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_attach_rejects_zero_interval() {
        let (near, _far) = tokio::io::duplex(64);
        let config = MuxConfig {
            keepalive_interval_ms: 0,
            ..MuxConfig::default()
        };
        assert!(matches!(
            DcpMux::attach(near, config),
            Err(MuxError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_send_checks_state_before_writing() {
        let (near, _far) = tokio::io::duplex(64);
        let (mux, _events) = DcpMux::attach(near, MuxConfig::default()).unwrap();

        assert!(matches!(
            mux.send(InterfaceId(1), false, b"x").await,
            Err(MuxError::InterfaceNotFound(_))
        ));

        mux.ifadd(InterfaceId(1), None);
        assert!(matches!(
            mux.send(InterfaceId(1), false, b"x").await,
            Err(MuxError::NotRunning(_))
        ));
        assert!(matches!(
            mux.send(InterfaceId(1), false, b"").await,
            Err(MuxError::EmptyMessage)
        ));

        mux.close().await;
        assert!(!mux.is_open());
        assert!(matches!(
            mux.ifup(InterfaceId(1)),
            Err(MuxError::TransportClosed)
        ));
    }
}
