//! Virtual station simulation
//!
//! Provides a simulated DCP keyset on the far end of a HUA link. It
//! answers link training, reassembles command trains, applies them to a
//! small model of the set (lamps, display rows, ringer, speaker), and
//! produces event trains when its buttons are pressed.

use std::collections::{BTreeMap, HashMap, VecDeque};

use dcp_mux::{FrameKind, HuaFrame, InterfaceId};
use dcp_protocol::{
    dcp_to_command, event_to_dcp, CommandKind, EncodeError, EraseMode, EventKind, KeypadMode,
    LedColor, LedMode, MmiCommand, MmiEvent, Reassembler, RingPattern,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for creating a virtual station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualStationConfig {
    /// Interface the station answers on
    pub id: InterfaceId,
    /// Name used in logs
    pub name: String,
    /// Logical channel advertised in probes
    pub lcn: u8,
    /// Acknowledge probes from the switch
    pub answer_probes: bool,
}

impl VirtualStationConfig {
    pub fn new(id: InterfaceId) -> Self {
        Self {
            id,
            name: format!("station{}", id.0),
            lcn: 1,
            answer_probes: true,
        }
    }
}

/// What a received frame did to the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationUpdate {
    /// The link came up
    LinkUp,
    /// The switch tore the link down
    LinkDown,
    /// A complete command arrived and was applied
    Command(MmiCommand),
}

/// A simulated DCP station
#[derive(Debug)]
pub struct VirtualStation {
    id: InterfaceId,
    name: String,
    lcn: u8,
    answer_probes: bool,
    linked: bool,
    reassembler: Reassembler,
    /// Frames waiting to go out on the link
    pending_output: VecDeque<HuaFrame>,
    /// Every command received, in order
    commands: Vec<MmiCommand>,
    leds: HashMap<String, (LedColor, LedMode)>,
    display: BTreeMap<u8, String>,
    programmed: BTreeMap<u8, String>,
    ringing: Option<RingPattern>,
    speaker_on: bool,
    keypad_mode: KeypadMode,
}

impl VirtualStation {
    /// Create a station from configuration
    pub fn from_config(config: VirtualStationConfig) -> Self {
        Self {
            id: config.id,
            name: config.name,
            lcn: config.lcn,
            answer_probes: config.answer_probes,
            linked: false,
            reassembler: Reassembler::new(),
            pending_output: VecDeque::new(),
            commands: Vec::new(),
            leds: HashMap::new(),
            display: BTreeMap::new(),
            programmed: BTreeMap::new(),
            ringing: None,
            speaker_on: false,
            keypad_mode: KeypadMode::Dial,
        }
    }

    /// Create a station with default settings
    pub fn new(id: InterfaceId) -> Self {
        Self::from_config(VirtualStationConfig::new(id))
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether link training completed
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Stop or resume answering probes, which simulates a dead set
    pub fn set_answer_probes(&mut self, answer: bool) {
        self.answer_probes = answer;
    }

    /// Commands received so far
    pub fn commands(&self) -> &[MmiCommand] {
        &self.commands
    }

    /// Lamp state for a control
    pub fn led(&self, control: &str) -> Option<(LedColor, LedMode)> {
        self.leds.get(control).copied()
    }

    /// Text shown on a display row
    pub fn display_row(&self, row: u8) -> Option<&str> {
        self.display.get(&row).map(String::as_str)
    }

    /// Label programmed into a soft key slot
    pub fn programmed(&self, slot: u8) -> Option<&str> {
        self.programmed.get(&slot).map(String::as_str)
    }

    pub fn ringing(&self) -> Option<RingPattern> {
        self.ringing
    }

    pub fn speaker_on(&self) -> bool {
        self.speaker_on
    }

    pub fn keypad_mode(&self) -> KeypadMode {
        self.keypad_mode
    }

    /// Take the next frame to transmit
    pub fn take_output(&mut self) -> Option<HuaFrame> {
        self.pending_output.pop_front()
    }

    /// Start link training from the station side
    pub fn probe(&mut self) {
        self.pending_output.push_back(HuaFrame::probe(self.id, self.lcn));
    }

    /// Tear the link down from the station side
    pub fn disconnect(&mut self) {
        self.linked = false;
        self.reassembler.clear();
        self.pending_output.push_back(HuaFrame::disconnect(self.id));
    }

    /// Queue an event train
    pub fn inject(&mut self, event: &MmiEvent) -> Result<(), EncodeError> {
        let train = event_to_dcp(event)?;
        for block in train.blocks() {
            self.pending_output.push_back(HuaFrame::data(
                self.id,
                false,
                block.more,
                block.payload.to_vec(),
            ));
        }
        Ok(())
    }

    fn inject_kind(&mut self, control: &str, kind: EventKind) {
        if let Err(e) = self.inject(&MmiEvent::new("", control, kind)) {
            warn!("{}: cannot encode event: {}", self.name, e);
        }
    }

    /// Press and release a feature button
    pub fn press_key(&mut self, control: &str) {
        self.inject_kind(control, EventKind::KeyPress);
        self.inject_kind(control, EventKind::KeyRelease);
    }

    /// Dial digits on the keypad
    pub fn dial(&mut self, digits: &str) {
        for digit in digits.bytes() {
            self.inject_kind("", EventKind::PadPress { digit });
            self.inject_kind("", EventKind::PadRelease { digit });
        }
    }

    /// Lift the handset
    pub fn go_off_hook(&mut self) {
        self.ringing = None;
        self.inject_kind("", EventKind::OffHook);
    }

    /// Hang up
    pub fn go_on_hook(&mut self) {
        self.inject_kind("", EventKind::OnHook);
    }

    /// Process a frame received from the switch
    pub fn handle_frame(&mut self, frame: &HuaFrame) -> Option<StationUpdate> {
        match frame.kind {
            FrameKind::Probe => {
                if !self.answer_probes {
                    debug!("{}: ignoring probe", self.name);
                    return None;
                }
                self.pending_output.push_back(HuaFrame::ack(self.id));
                self.link_up()
            }
            FrameKind::Ack => self.link_up(),
            FrameKind::Disconnect => {
                self.reassembler.clear();
                if std::mem::replace(&mut self.linked, false) {
                    Some(StationUpdate::LinkDown)
                } else {
                    None
                }
            }
            FrameKind::Data => {
                if !frame.command {
                    debug!("{}: ignoring event train from switch", self.name);
                    return None;
                }
                let message = match self.reassembler.push(&frame.payload, frame.more) {
                    Ok(Some(message)) => message,
                    Ok(None) => return None,
                    Err(e) => {
                        warn!("{}: {}", self.name, e);
                        return None;
                    }
                };
                match dcp_to_command(&message) {
                    Ok(command) => {
                        debug!("{}: {} command", self.name, command.kind.name());
                        self.apply(&command);
                        self.commands.push(command.clone());
                        Some(StationUpdate::Command(command))
                    }
                    Err(e) => {
                        warn!("{}: bad command: {}", self.name, e);
                        None
                    }
                }
            }
        }
    }

    fn link_up(&mut self) -> Option<StationUpdate> {
        if std::mem::replace(&mut self.linked, true) {
            None
        } else {
            Some(StationUpdate::LinkUp)
        }
    }

    /// Apply a command to the station model
    pub fn apply(&mut self, command: &MmiCommand) {
        match &command.kind {
            CommandKind::Led { color, mode } => {
                if *mode == LedMode::Off {
                    self.leds.remove(&command.control);
                } else {
                    self.leds.insert(command.control.clone(), (*color, *mode));
                }
            }
            CommandKind::Program { slot, text } => {
                self.programmed.insert(*slot, text.clone());
            }
            CommandKind::Text {
                row,
                column,
                erase,
                text,
            } => self.write_text(*row, *column, *erase, text),
            CommandKind::OffHook => self.speaker_on = true,
            CommandKind::OnHook => self.speaker_on = false,
            CommandKind::Ring { pattern } => self.ringing = Some(*pattern),
            CommandKind::RingOff => self.ringing = None,
            CommandKind::KeypadMode { mode } => self.keypad_mode = *mode,
            CommandKind::Identify => {
                self.leds.clear();
                self.display.clear();
                self.ringing = None;
            }
            CommandKind::Beep { .. }
            | CommandKind::Timer { .. }
            | CommandKind::Echo { .. }
            | CommandKind::Scroll { .. } => {}
        }
    }

    fn write_text(&mut self, row: u8, column: u8, erase: EraseMode, text: &str) {
        match erase {
            EraseMode::Display => self.display.clear(),
            EraseMode::Line => {
                self.display.remove(&row);
            }
            EraseMode::ToEndOfLine => {
                if let Some(line) = self.display.get_mut(&row) {
                    *line = line.chars().take(column as usize).collect();
                }
            }
            EraseMode::None => {}
        }

        let line = self.display.entry(row).or_default();
        let mut chars: Vec<char> = line.chars().collect();
        let column = column as usize;
        if chars.len() < column {
            chars.resize(column, ' ');
        }
        for (offset, ch) in text.chars().enumerate() {
            match chars.get_mut(column + offset) {
                Some(slot) => *slot = ch,
                None => chars.push(ch),
            }
        }
        *line = chars.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_protocol::{dcp_to_mmi, mmi_to_dcp, Reassembler};

    fn deliver(station: &mut VirtualStation, command: &MmiCommand) -> Vec<StationUpdate> {
        let train = mmi_to_dcp(command).unwrap();
        train
            .blocks()
            .filter_map(|block| {
                station.handle_frame(&HuaFrame::data(
                    station.id(),
                    true,
                    block.more,
                    block.payload.to_vec(),
                ))
            })
            .collect()
    }

    fn drain_events(station: &mut VirtualStation) -> Vec<EventKind> {
        let mut reassembler = Reassembler::new();
        let mut events = Vec::new();
        while let Some(frame) = station.take_output() {
            if frame.kind != FrameKind::Data {
                continue;
            }
            if let Some(message) = reassembler.push(&frame.payload, frame.more).unwrap() {
                events.push(dcp_to_mmi(&message).kind);
            }
        }
        events
    }

    #[test]
    fn test_answers_link_check_once() {
        let mut station = VirtualStation::new(InterfaceId(1));
        let probe = HuaFrame::probe(InterfaceId(1), 1);

        assert_eq!(station.handle_frame(&probe), Some(StationUpdate::LinkUp));
        assert_eq!(station.take_output().map(|f| f.kind), Some(FrameKind::Ack));

        assert_eq!(station.handle_frame(&probe), None, "keepalive");
        assert_eq!(station.take_output().map(|f| f.kind), Some(FrameKind::Ack));
    }

    #[test]
    fn test_silent_station() {
        let mut station = VirtualStation::new(InterfaceId(1));
        station.set_answer_probes(false);
        assert_eq!(station.handle_frame(&HuaFrame::probe(InterfaceId(1), 1)), None);
        assert!(station.take_output().is_none());
        assert!(!station.is_linked());
    }

    #[test]
    fn test_display_text_applied() {
        let mut station = VirtualStation::new(InterfaceId(2));
        deliver(&mut station, &MmiCommand::text("", 0, 0, EraseMode::Display, "Hello world"));
        deliver(&mut station, &MmiCommand::text("", 0, 6, EraseMode::ToEndOfLine, "DCP"));
        assert_eq!(station.display_row(0), Some("Hello DCP"));

        deliver(&mut station, &MmiCommand::text("", 1, 2, EraseMode::None, "x"));
        assert_eq!(station.display_row(1), Some("  x"));
    }

    #[test]
    fn test_long_command_reassembled() {
        let mut station = VirtualStation::new(InterfaceId(2));
        let text = "z".repeat(300);
        let updates = deliver(&mut station, &MmiCommand::text("", 0, 0, EraseMode::Display, text.clone()));

        assert_eq!(updates.len(), 1);
        assert_eq!(station.commands().len(), 1);
        assert_eq!(station.display_row(0), Some(text.as_str()));
    }

    #[test]
    fn test_led_and_ring() {
        let mut station = VirtualStation::new(InterfaceId(3));
        deliver(&mut station, &MmiCommand::led("", "line1", LedColor::Green, LedMode::Flash));
        deliver(&mut station, &MmiCommand::new("", "", CommandKind::Ring { pattern: RingPattern::Priority }));
        assert_eq!(station.led("line1"), Some((LedColor::Green, LedMode::Flash)));
        assert_eq!(station.ringing(), Some(RingPattern::Priority));

        station.go_off_hook();
        assert_eq!(station.ringing(), None);
        assert_eq!(drain_events(&mut station), vec![EventKind::OffHook]);
    }

    #[test]
    fn test_dial_produces_press_release_pairs() {
        let mut station = VirtualStation::new(InterfaceId(4));
        station.dial("12");
        assert_eq!(
            drain_events(&mut station),
            vec![
                EventKind::PadPress { digit: b'1' },
                EventKind::PadRelease { digit: b'1' },
                EventKind::PadPress { digit: b'2' },
                EventKind::PadRelease { digit: b'2' },
            ]
        );
    }

    #[test]
    fn test_disconnect_from_switch() {
        let mut station = VirtualStation::new(InterfaceId(5));
        station.handle_frame(&HuaFrame::ack(InterfaceId(5)));
        assert!(station.is_linked());
        assert_eq!(
            station.handle_frame(&HuaFrame::disconnect(InterfaceId(5))),
            Some(StationUpdate::LinkDown)
        );
        assert!(!station.is_linked());
    }
}
