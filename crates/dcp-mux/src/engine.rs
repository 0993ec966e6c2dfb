//! Interface table and link state machine
//!
//! The engine owns every interface record and decides what happens on
//! caller requests, received frames and timer expiry. It performs no I/O:
//! each operation queues [`Action`]s (frames to transmit, events to emit)
//! which the caller drains and executes after releasing the table lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dcp_protocol::{dcp_to_command, dcp_to_mmi, link_lost, link_up, Reassembler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::{FrameKind, HuaFrame};
use crate::error::MuxError;
use crate::events::MuxEvent;
use crate::filter::Filter;
use crate::state::{default_hwname, InterfaceId, InterfaceParams, InterfaceState};
use crate::strmap::StrMap;
use crate::timer::{TimerHandle, TimerQueue};

/// Multiplexer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Probe interval while a link is training (ms)
    pub retry_interval_ms: u64,
    /// Probe interval on a running link (ms)
    pub keepalive_interval_ms: u64,
    /// Silence after which a running link is declared lost (ms)
    pub dead_interval_ms: u64,
    /// Capacity of the event channel
    pub event_buffer: usize,
    /// Logical channel used when an interface is added without parameters
    pub default_lcn: u8,
    /// Buckets in the hardware name index
    pub name_buckets: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1000,
            keepalive_interval_ms: 5000,
            dead_interval_ms: 15000,
            event_buffer: 256,
            default_lcn: 1,
            name_buckets: 64,
        }
    }
}

impl MuxConfig {
    /// Reject values the worker cannot run with
    ///
    /// A zero interval would re-arm its timer for the instant it fired.
    pub fn validate(&self) -> Result<(), MuxError> {
        if self.retry_interval_ms == 0 {
            return Err(MuxError::InvalidConfig("retry_interval_ms must be positive"));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(MuxError::InvalidConfig("keepalive_interval_ms must be positive"));
        }
        if self.dead_interval_ms == 0 {
            return Err(MuxError::InvalidConfig("dead_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn dead_interval(&self) -> Duration {
        Duration::from_millis(self.dead_interval_ms)
    }
}

/// Work produced by the engine for the I/O side
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Transmit(HuaFrame),
    Emit(MuxEvent),
}

#[derive(Debug)]
struct Interface {
    id: InterfaceId,
    lcn: u8,
    hwname: String,
    state: InterfaceState,
    eligible: bool,
    timer: TimerHandle,
    reassembly: Reassembler,
    reassembly_command: bool,
    last_heard: Instant,
    tx_lock: Arc<AsyncMutex<()>>,
}

impl Interface {
    fn lost_event(&self) -> Action {
        Action::Emit(MuxEvent::Event {
            id: self.id,
            event: link_lost().with_station(&self.hwname),
        })
    }

    fn up_event(&self) -> Action {
        Action::Emit(MuxEvent::Event {
            id: self.id,
            event: link_up().with_station(&self.hwname),
        })
    }

    /// Enter RUNNING and start keepalives
    fn promote(&mut self, timers: &TimerQueue<InterfaceId>, config: &MuxConfig, now: Instant, actions: &mut Vec<Action>) {
        info!("Interface {} ({}) is up", self.id, self.hwname);
        self.state = InterfaceState::Running;
        self.reassembly.clear();
        timers.change(self.timer, now + config.keepalive_interval());
        actions.push(self.up_event());
    }

    /// Leave RUNNING; resume training if still eligible
    fn demote(&mut self, timers: &TimerQueue<InterfaceId>, config: &MuxConfig, now: Instant, actions: &mut Vec<Action>) {
        self.state = InterfaceState::Inactive;
        self.reassembly.clear();
        if self.eligible {
            timers.change(self.timer, now + config.retry_interval());
        } else {
            timers.unlink(self.timer);
        }
        actions.push(self.lost_event());
    }

    /// Make ineligible and stop all link activity
    fn shut(&mut self, timers: &TimerQueue<InterfaceId>, notify_peer: bool, actions: &mut Vec<Action>) {
        self.eligible = false;
        timers.unlink(self.timer);
        self.reassembly.clear();
        if self.state == InterfaceState::Running {
            self.state = InterfaceState::Inactive;
            actions.push(self.lost_event());
            if notify_peer {
                actions.push(Action::Transmit(HuaFrame::disconnect(self.id)));
            }
        }
    }
}

/// Table of interfaces on one transport
pub(crate) struct Engine {
    config: MuxConfig,
    interfaces: HashMap<InterfaceId, Interface>,
    names: StrMap<InterfaceId>,
    timers: Arc<TimerQueue<InterfaceId>>,
    filter: Option<Arc<Filter>>,
    actions: Vec<Action>,
}

impl Engine {
    pub fn new(config: MuxConfig, timers: Arc<TimerQueue<InterfaceId>>) -> Self {
        let names = StrMap::new(config.name_buckets).unwrap_or_default();
        Self {
            config,
            interfaces: HashMap::new(),
            names,
            timers,
            filter: None,
            actions: Vec::new(),
        }
    }

    /// Drain queued actions
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn set_filter(&mut self, filter: Option<Arc<Filter>>) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Option<Arc<Filter>> {
        self.filter.clone()
    }

    /// Register an interface, or update the parameters of an existing one
    pub fn add(&mut self, id: InterfaceId, params: Option<InterfaceParams>) {
        let params = params.unwrap_or_else(|| InterfaceParams::new(self.config.default_lcn));
        let hwname = params.hwname.unwrap_or_else(|| default_hwname(id));

        if let Some(iface) = self.interfaces.get_mut(&id) {
            if iface.hwname != hwname {
                self.names.put(&iface.hwname, None);
                self.names.put(&hwname, Some(id));
                iface.hwname = hwname;
            }
            iface.lcn = params.lcn;
            debug!("Interface {} parameters updated (lcn {})", id, iface.lcn);
            return;
        }

        if let Some(previous) = self.names.put(&hwname, Some(id)) {
            warn!("Hardware name {} moved from interface {} to {}", hwname, previous, id);
        }
        info!("Added interface {} ({}, lcn {})", id, hwname, params.lcn);
        let timer = self.timers.alloc(id);
        self.interfaces.insert(
            id,
            Interface {
                id,
                lcn: params.lcn,
                hwname,
                state: InterfaceState::Inactive,
                eligible: false,
                timer,
                reassembly: Reassembler::new(),
                reassembly_command: false,
                last_heard: Instant::now(),
                tx_lock: Arc::new(AsyncMutex::new(())),
            },
        );
    }

    /// Make an interface eligible for link training
    ///
    /// Returns true when a training timer was armed, so the worker should
    /// re-evaluate its sleep.
    pub fn up(&mut self, id: InterfaceId, now: Instant) -> Result<bool, MuxError> {
        let iface = self
            .interfaces
            .get_mut(&id)
            .ok_or(MuxError::InterfaceNotFound(id))?;
        if iface.eligible {
            return Ok(false);
        }
        iface.eligible = true;
        debug!("Interface {} eligible for training", id);
        Ok(self.timers.change(iface.timer, now))
    }

    /// Make an interface ineligible, tearing down a running link
    pub fn down(&mut self, id: InterfaceId) -> Result<(), MuxError> {
        let iface = self
            .interfaces
            .get_mut(&id)
            .ok_or(MuxError::InterfaceNotFound(id))?;
        iface.shut(&self.timers, true, &mut self.actions);
        debug!("Interface {} down", id);
        Ok(())
    }

    /// Remove an interface
    pub fn remove(&mut self, id: InterfaceId) -> Result<(), MuxError> {
        self.down(id)?;
        if let Some(iface) = self.interfaces.remove(&id) {
            self.timers.cancel(iface.timer);
            if self.names.get(&iface.hwname) == Some(&id) {
                self.names.put(&iface.hwname, None);
            }
            info!("Removed interface {} ({})", id, iface.hwname);
        }
        Ok(())
    }

    /// Remove every interface
    pub fn teardown(&mut self) {
        let ids: Vec<InterfaceId> = self.interfaces.keys().copied().collect();
        for id in ids {
            // ids come from the table, removal cannot miss
            let _ = self.remove(id);
        }
    }

    /// A write for `id` failed: treat the link as gone without telling the peer
    pub fn write_failed(&mut self, id: InterfaceId) {
        if let Some(iface) = self.interfaces.get_mut(&id) {
            warn!("Write failed on interface {}, taking it down", id);
            iface.shut(&self.timers, false, &mut self.actions);
        }
    }

    /// The transport is gone: every running link is lost
    pub fn transport_lost(&mut self) {
        for iface in self.interfaces.values_mut() {
            iface.shut(&self.timers, false, &mut self.actions);
        }
    }

    pub fn state(&self, id: InterfaceId) -> InterfaceState {
        self.interfaces
            .get(&id)
            .map_or(InterfaceState::NotFound, |iface| iface.state)
    }

    pub fn list(&self) -> Vec<(InterfaceId, InterfaceState)> {
        let mut list: Vec<_> = self
            .interfaces
            .values()
            .map(|iface| (iface.id, iface.state))
            .collect();
        list.sort_by_key(|(id, _)| *id);
        list
    }

    pub fn lookup_hwname(&self, hwname: &str) -> Option<InterfaceId> {
        self.names.get(hwname).copied()
    }

    pub fn hwname(&self, id: InterfaceId) -> Option<&str> {
        self.interfaces.get(&id).map(|iface| iface.hwname.as_str())
    }

    /// Transmit lock of a running interface
    pub fn check_send(&self, id: InterfaceId) -> Result<Arc<AsyncMutex<()>>, MuxError> {
        let iface = self
            .interfaces
            .get(&id)
            .ok_or(MuxError::InterfaceNotFound(id))?;
        if iface.state != InterfaceState::Running {
            return Err(MuxError::NotRunning(id));
        }
        Ok(iface.tx_lock.clone())
    }

    /// Whether the filter lets commands through to `id`
    pub fn check_command(&self, id: InterfaceId) -> Result<(), MuxError> {
        let hwname = self.hwname(id).ok_or(MuxError::InterfaceNotFound(id))?;
        match &self.filter {
            Some(filter) if !filter.receives_commands(hwname) => Err(MuxError::Filtered {
                id,
                hwname: hwname.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Handle an expired timer entry
    pub fn on_timer(&mut self, handle: TimerHandle, id: InterfaceId, now: Instant) {
        let Some(iface) = self.interfaces.get_mut(&id) else {
            return;
        };
        if iface.timer != handle {
            return;
        }

        match (iface.state, iface.eligible) {
            (InterfaceState::Running, _) => {
                let silent = now.saturating_duration_since(iface.last_heard);
                if silent > self.config.dead_interval() {
                    warn!(
                        "Interface {} silent for {:?}, declaring link lost",
                        id, silent
                    );
                    iface.demote(&self.timers, &self.config, now, &mut self.actions);
                } else {
                    self.actions
                        .push(Action::Transmit(HuaFrame::probe(id, iface.lcn)));
                    self.timers
                        .append(handle, now + self.config.keepalive_interval());
                }
            }
            (InterfaceState::Inactive, true) => {
                debug!("Interface {}: training probe", id);
                self.actions
                    .push(Action::Transmit(HuaFrame::probe(id, iface.lcn)));
                self.timers
                    .insert(handle, now + self.config.retry_interval());
            }
            _ => {}
        }
    }

    /// Handle a frame received from the transport
    pub fn on_frame(&mut self, frame: HuaFrame, now: Instant) {
        let id = frame.id;
        let Some(iface) = self.interfaces.get_mut(&id) else {
            warn!("Dropping {:?} frame for unknown interface {}", frame.kind, id);
            return;
        };
        iface.last_heard = now;

        match frame.kind {
            FrameKind::Probe => {
                if !iface.eligible {
                    debug!("Ignoring probe on ineligible interface {}", id);
                    return;
                }
                self.actions.push(Action::Transmit(HuaFrame::ack(id)));
                if iface.state == InterfaceState::Inactive {
                    iface.promote(&self.timers, &self.config, now, &mut self.actions);
                }
            }
            FrameKind::Ack => {
                if iface.eligible && iface.state == InterfaceState::Inactive {
                    iface.promote(&self.timers, &self.config, now, &mut self.actions);
                }
            }
            FrameKind::Disconnect => {
                if iface.state == InterfaceState::Running {
                    info!("Peer disconnected interface {}", id);
                    iface.demote(&self.timers, &self.config, now, &mut self.actions);
                }
            }
            FrameKind::Data => {
                if iface.state != InterfaceState::Running {
                    debug!("Dropping data for interface {} in state {}", id, iface.state.name());
                    return;
                }
                if iface.reassembly.is_pending() && iface.reassembly_command != frame.command {
                    warn!(
                        "Interface {}: train direction changed, discarding {} pending bytes",
                        id,
                        iface.reassembly.pending_len()
                    );
                    iface.reassembly.clear();
                }
                iface.reassembly_command = frame.command;

                match iface.reassembly.push(&frame.payload, frame.more) {
                    Ok(Some(message)) => {
                        let event = decode_message(
                            id,
                            &iface.hwname,
                            frame.command,
                            &message,
                            self.filter.as_deref(),
                        );
                        if let Some(event) = event {
                            self.actions.push(Action::Emit(event));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Interface {}: {}", id, e),
                }
            }
        }
    }
}

/// Decode a completed train into the event delivered to the owner
fn decode_message(
    id: InterfaceId,
    hwname: &str,
    is_command: bool,
    message: &[u8],
    filter: Option<&Filter>,
) -> Option<MuxEvent> {
    if is_command {
        let command = match dcp_to_command(message) {
            Ok(command) => command.with_station(hwname),
            Err(e) => {
                warn!("Interface {}: malformed command: {}", id, e);
                return None;
            }
        };
        if filter.is_some_and(|f| !f.receives_commands(hwname)) {
            debug!("Filtered {} command for {}", command.kind.name(), hwname);
            return None;
        }
        return Some(MuxEvent::Command { id, command });
    }

    let event = dcp_to_mmi(message).with_station(hwname);
    if event.is_unknown() {
        warn!("Interface {}: unrecognized station message {:02X?}", id, message);
    }
    if filter.is_some_and(|f| !f.sends_events(hwname)) {
        debug!("Filtered {} event from {}", event.kind.name(), hwname);
        return None;
    }
    Some(MuxEvent::Event { id, event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_protocol::{event_to_dcp, mmi_to_dcp, EraseMode, EventKind, MmiCommand, MmiEvent};

    fn engine() -> Engine {
        Engine::new(MuxConfig::default(), Arc::new(TimerQueue::new()))
    }

    #[test]
    fn test_config_rejects_zero_intervals() {
        assert!(MuxConfig::default().validate().is_ok());

        for config in [
            MuxConfig { retry_interval_ms: 0, ..MuxConfig::default() },
            MuxConfig { keepalive_interval_ms: 0, ..MuxConfig::default() },
            MuxConfig { dead_interval_ms: 0, ..MuxConfig::default() },
        ] {
            assert!(matches!(config.validate(), Err(MuxError::InvalidConfig(_))));
        }
    }

    /// Run every due timer
    fn fire(engine: &mut Engine, now: Instant) {
        let timers = engine.timers.clone();
        timers.expire(now, |handle, id| engine.on_timer(handle, id, now));
    }

    fn emitted(actions: &[Action]) -> Vec<EventKind> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit(MuxEvent::Event { event, .. }) => Some(event.kind.clone()),
                _ => None,
            })
            .collect()
    }

    fn transmitted(actions: &[Action]) -> Vec<FrameKind> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Transmit(frame) => Some(frame.kind),
                _ => None,
            })
            .collect()
    }

    fn running(engine: &mut Engine, id: InterfaceId, now: Instant) {
        engine.add(id, None);
        engine.up(id, now).unwrap();
        engine.on_frame(HuaFrame::ack(id), now);
        engine.take_actions();
    }

    #[test]
    fn test_add_defaults() {
        let mut engine = engine();
        engine.add(InterfaceId(5), None);

        assert_eq!(engine.state(InterfaceId(5)), InterfaceState::Inactive);
        assert_eq!(engine.state(InterfaceId(6)), InterfaceState::NotFound);
        assert_eq!(engine.lookup_hwname("dcp5"), Some(InterfaceId(5)));
        assert!(engine.timers.is_empty());
    }

    #[test]
    fn test_add_existing_renames() {
        let mut engine = engine();
        engine.add(InterfaceId(1), None);
        engine.add(
            InterfaceId(1),
            Some(InterfaceParams::new(4).with_hwname("lobby")),
        );

        assert_eq!(engine.lookup_hwname("dcp1"), None);
        assert_eq!(engine.lookup_hwname("lobby"), Some(InterfaceId(1)));
        assert_eq!(engine.list(), vec![(InterfaceId(1), InterfaceState::Inactive)]);
    }

    #[test]
    fn test_list_ordered_by_id() {
        let mut engine = engine();
        let now = Instant::now();
        for id in [9, 2, 5] {
            engine.add(InterfaceId(id), None);
        }
        running(&mut engine, InterfaceId(7), now);

        assert_eq!(
            engine.list(),
            vec![
                (InterfaceId(2), InterfaceState::Inactive),
                (InterfaceId(5), InterfaceState::Inactive),
                (InterfaceId(7), InterfaceState::Running),
                (InterfaceId(9), InterfaceState::Inactive),
            ]
        );
    }

    #[test]
    fn test_up_unknown_interface() {
        let mut engine = engine();
        assert!(matches!(
            engine.up(InterfaceId(9), Instant::now()),
            Err(MuxError::InterfaceNotFound(InterfaceId(9)))
        ));
    }

    #[test]
    fn test_training_retries_until_ack() {
        let mut engine = engine();
        let id = InterfaceId(2);
        let start = Instant::now();
        engine.add(id, None);
        assert!(engine.up(id, start).unwrap());
        assert!(!engine.up(id, start).unwrap(), "second up is a no-op");

        fire(&mut engine, start);
        assert_eq!(transmitted(&engine.take_actions()), vec![FrameKind::Probe]);

        let retry = start + engine.config().retry_interval();
        fire(&mut engine, retry);
        assert_eq!(transmitted(&engine.take_actions()), vec![FrameKind::Probe]);

        engine.on_frame(HuaFrame::ack(id), retry);
        let actions = engine.take_actions();
        assert_eq!(emitted(&actions), vec![EventKind::Up]);
        assert_eq!(engine.state(id), InterfaceState::Running);

        // A duplicate ack does not announce the link twice
        engine.on_frame(HuaFrame::ack(id), retry);
        assert!(engine.take_actions().is_empty());
    }

    #[test]
    fn test_link_check_from_peer_is_acked() {
        let mut engine = engine();
        let id = InterfaceId(3);
        let now = Instant::now();
        engine.add(id, None);

        engine.on_frame(HuaFrame::probe(id, 1), now);
        assert!(engine.take_actions().is_empty(), "ineligible ignores probes");

        engine.up(id, now).unwrap();
        engine.on_frame(HuaFrame::probe(id, 1), now);
        let actions = engine.take_actions();
        assert_eq!(transmitted(&actions), vec![FrameKind::Ack]);
        assert_eq!(emitted(&actions), vec![EventKind::Up]);
    }

    #[test]
    fn test_keepalive_and_dead_interval() {
        let mut engine = engine();
        let id = InterfaceId(4);
        let start = Instant::now();
        running(&mut engine, id, start);

        let keepalive = start + engine.config().keepalive_interval();
        fire(&mut engine, keepalive);
        assert_eq!(transmitted(&engine.take_actions()), vec![FrameKind::Probe]);
        assert_eq!(engine.state(id), InterfaceState::Running);

        let late = start
            + engine.config().dead_interval()
            + engine.config().keepalive_interval()
            + Duration::from_millis(1);
        fire(&mut engine, late);
        let actions = engine.take_actions();
        assert_eq!(emitted(&actions), vec![EventKind::Lost]);
        assert_eq!(engine.state(id), InterfaceState::Inactive);
        assert_eq!(engine.timers.len(), 1, "training resumes");
    }

    #[test]
    fn test_down_emits_lost_once() {
        let mut engine = engine();
        let id = InterfaceId(6);
        running(&mut engine, id, Instant::now());

        engine.down(id).unwrap();
        let actions = engine.take_actions();
        assert_eq!(emitted(&actions), vec![EventKind::Lost]);
        assert_eq!(transmitted(&actions), vec![FrameKind::Disconnect]);
        assert!(engine.timers.is_empty());

        engine.down(id).unwrap();
        assert!(engine.take_actions().is_empty());
        assert!(matches!(
            engine.check_send(id),
            Err(MuxError::NotRunning(_))
        ));
    }

    #[test]
    fn test_remove_frees_name_and_timer() {
        let mut engine = engine();
        let id = InterfaceId(8);
        running(&mut engine, id, Instant::now());

        engine.remove(id).unwrap();
        assert_eq!(emitted(&engine.take_actions()), vec![EventKind::Lost]);
        assert_eq!(engine.state(id), InterfaceState::NotFound);
        assert_eq!(engine.lookup_hwname("dcp8"), None);
        assert!(matches!(
            engine.remove(id),
            Err(MuxError::InterfaceNotFound(_))
        ));
    }

    #[test]
    fn test_stale_timer_ignored_after_readd() {
        let mut engine = engine();
        let id = InterfaceId(1);
        let now = Instant::now();
        engine.add(id, None);
        engine.up(id, now).unwrap();

        let mut stale = None;
        engine.timers.clone().expire(now, |handle, _| stale = Some(handle));
        engine.remove(id).unwrap();
        engine.add(id, None);
        engine.up(id, now).unwrap();
        engine.take_actions();

        engine.on_timer(stale.unwrap(), id, now);
        assert!(engine.take_actions().is_empty());
    }

    #[test]
    fn test_data_reassembly_and_station_stamp() {
        let mut engine = engine();
        let id = InterfaceId(2);
        let now = Instant::now();
        engine.add(id, Some(InterfaceParams::new(1).with_hwname("desk")));
        engine.up(id, now).unwrap();
        engine.on_frame(HuaFrame::ack(id), now);
        engine.take_actions();

        let event = MmiEvent::new("", "line1", EventKind::KeyPress);
        let train = event_to_dcp(&event).unwrap();
        for block in train.blocks() {
            engine.on_frame(HuaFrame::data(id, false, block.more, block.payload.to_vec()), now);
        }

        match engine.take_actions().as_slice() {
            [Action::Emit(MuxEvent::Event { id: got, event: ev })] => {
                assert_eq!(*got, id);
                assert_eq!(ev.station, "desk");
                assert_eq!(ev.kind, EventKind::KeyPress);
            }
            other => panic!("unexpected actions {:?}", other),
        }
    }

    #[test]
    fn test_direction_change_discards_partial_train() {
        let mut engine = engine();
        let id = InterfaceId(2);
        running(&mut engine, id, Instant::now());

        let cmd = MmiCommand::text("", 0, 0, EraseMode::Display, "y".repeat(300));
        let train = mmi_to_dcp(&cmd).unwrap();
        let first = train.blocks().next().unwrap();
        engine.on_frame(HuaFrame::data(id, true, true, first.payload.to_vec()), Instant::now());

        let event = event_to_dcp(&MmiEvent::new("", "", EventKind::OffHook)).unwrap();
        engine.on_frame(HuaFrame::data(id, false, false, event.into_bytes()), Instant::now());

        assert_eq!(emitted(&engine.take_actions()), vec![EventKind::OffHook]);
    }

    #[test]
    fn test_filter_blocks_events_not_status() {
        let mut engine = engine();
        let id = InterfaceId(3);
        engine.set_filter(Some(Filter::new("deny")));
        engine.add(id, None);
        engine.up(id, Instant::now()).unwrap();
        engine.on_frame(HuaFrame::ack(id), Instant::now());
        assert_eq!(emitted(&engine.take_actions()), vec![EventKind::Up]);

        let event = event_to_dcp(&MmiEvent::new("", "", EventKind::OnHook)).unwrap();
        engine.on_frame(HuaFrame::data(id, false, false, event.into_bytes()), Instant::now());
        assert!(engine.take_actions().is_empty());

        assert!(matches!(
            engine.check_command(id),
            Err(MuxError::Filtered { .. })
        ));
    }

    #[test]
    fn test_transport_lost_only_reports_running() {
        let mut engine = engine();
        let now = Instant::now();
        running(&mut engine, InterfaceId(1), now);
        engine.add(InterfaceId(2), None);
        engine.up(InterfaceId(2), now).unwrap();

        engine.transport_lost();
        let actions = engine.take_actions();
        assert_eq!(emitted(&actions), vec![EventKind::Lost]);
        assert!(transmitted(&actions).is_empty());
        assert!(engine.timers.is_empty());
    }

    #[test]
    fn test_unknown_interface_frame_dropped() {
        let mut engine = engine();
        engine.on_frame(HuaFrame::probe(InterfaceId(77), 1), Instant::now());
        assert!(engine.take_actions().is_empty());
    }
}
