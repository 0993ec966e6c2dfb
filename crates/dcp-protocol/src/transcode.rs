//! DCP message layout and the command/event transcoder
//!
//! # Message Format
//! ```text
//! [class] [opcode] [ctl_len] [control...] [payload...]
//! ```
//!
//! - `class`: `0x81` for commands (switch → station), `0x42` for status
//!   reports (station → switch)
//! - `opcode`: message kind within the class
//! - `ctl_len`, `control`: UTF-8 control name, at most 255 bytes
//! - `payload`: kind-specific, see [`CommandOpcode`] and [`StatusCode`]
//!
//! Text-carrying payloads (`Text`, `Program`) end with the text, which runs
//! to the end of the message. The encoded message is cut into blocks by
//! [`Train`]; the layout above applies to the reassembled bytes.

use crate::command::{
    CommandKind, EraseMode, KeypadMode, LedColor, LedMode, MmiCommand, RingPattern,
    ScrollDirection,
};
use crate::error::{EncodeError, ParseError};
use crate::event::{EventKind, MmiEvent};
use crate::train::{Train, MAX_TRAIN_BYTES, MAX_TRAIN_BLOCKS};

/// Class byte of a command message
pub const CLASS_COMMAND: u8 = 0x81;
/// Class byte of a status message
pub const CLASS_STATUS: u8 = 0x42;

/// Bytes before the control name: class, opcode, control length
const HEADER_LEN: usize = 3;

/// Command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOpcode {
    /// `[color] [mode]`
    Led = 0x10,
    /// `[slot] [text...]`
    Program = 0x11,
    /// `[row] [column] [erase] [text...]`
    Text = 0x12,
    /// no payload
    OffHook = 0x20,
    /// no payload
    OnHook = 0x21,
    /// `[pattern]`
    Ring = 0x30,
    /// no payload
    RingOff = 0x31,
    /// `[tone]`
    Beep = 0x32,
    /// `[0|1]`
    Timer = 0x40,
    /// no payload
    Identify = 0x41,
    /// `[0|1]`
    Echo = 0x42,
    /// `[direction]`
    Scroll = 0x43,
    /// `[mode]`
    KeypadMode = 0x44,
}

impl TryFrom<u8> for CommandOpcode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(Self::Led),
            0x11 => Ok(Self::Program),
            0x12 => Ok(Self::Text),
            0x20 => Ok(Self::OffHook),
            0x21 => Ok(Self::OnHook),
            0x30 => Ok(Self::Ring),
            0x31 => Ok(Self::RingOff),
            0x32 => Ok(Self::Beep),
            0x40 => Ok(Self::Timer),
            0x41 => Ok(Self::Identify),
            0x42 => Ok(Self::Echo),
            0x43 => Ok(Self::Scroll),
            0x44 => Ok(Self::KeypadMode),
            _ => Err(ParseError::UnknownPrefix(CLASS_COMMAND, value)),
        }
    }
}

impl From<&CommandKind> for CommandOpcode {
    fn from(kind: &CommandKind) -> Self {
        match kind {
            CommandKind::Led { .. } => Self::Led,
            CommandKind::Program { .. } => Self::Program,
            CommandKind::Text { .. } => Self::Text,
            CommandKind::OffHook => Self::OffHook,
            CommandKind::OnHook => Self::OnHook,
            CommandKind::Ring { .. } => Self::Ring,
            CommandKind::RingOff => Self::RingOff,
            CommandKind::Beep { .. } => Self::Beep,
            CommandKind::Timer { .. } => Self::Timer,
            CommandKind::Identify => Self::Identify,
            CommandKind::Echo { .. } => Self::Echo,
            CommandKind::Scroll { .. } => Self::Scroll,
            CommandKind::KeypadMode { .. } => Self::KeypadMode,
        }
    }
}

/// Status codes reported by a station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// no payload
    OffHook = 0x01,
    /// no payload
    OnHook = 0x02,
    /// no payload, control names the button
    KeyPress = 0x03,
    /// no payload, control names the button
    KeyRelease = 0x04,
    /// `[digit]`
    PadPress = 0x05,
    /// `[digit]`
    PadRelease = 0x06,
    /// no payload
    MenuExit = 0x07,
    /// `[item]`
    MenuItem = 0x08,
    /// `[slot] [0|1]`
    ProgramResult = 0x09,
}

impl TryFrom<u8> for StatusCode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::OffHook),
            0x02 => Ok(Self::OnHook),
            0x03 => Ok(Self::KeyPress),
            0x04 => Ok(Self::KeyRelease),
            0x05 => Ok(Self::PadPress),
            0x06 => Ok(Self::PadRelease),
            0x07 => Ok(Self::MenuExit),
            0x08 => Ok(Self::MenuItem),
            0x09 => Ok(Self::ProgramResult),
            _ => Err(ParseError::UnknownPrefix(CLASS_STATUS, value)),
        }
    }
}

/// Encode a structured message into a block train
pub trait ToTrain {
    /// Encode `self`, leaving it untouched
    fn to_train(&self) -> Result<Train, EncodeError>;
}

impl ToTrain for MmiCommand {
    fn to_train(&self) -> Result<Train, EncodeError> {
        let opcode = CommandOpcode::from(&self.kind);
        let mut out = header(CLASS_COMMAND, opcode as u8, &self.control)?;

        match &self.kind {
            CommandKind::Led { color, mode } => {
                out.push(color.code());
                out.push(mode.code());
            }
            CommandKind::Program { slot, text } => {
                out.push(*slot);
                out.extend_from_slice(text.as_bytes());
            }
            CommandKind::Text {
                row,
                column,
                erase,
                text,
            } => {
                out.push(*row);
                out.push(*column);
                out.push(erase.code());
                out.extend_from_slice(text.as_bytes());
            }
            CommandKind::Ring { pattern } => out.push(pattern.code()),
            CommandKind::Beep { tone } => out.push(*tone),
            CommandKind::Timer { running } => out.push(u8::from(*running)),
            CommandKind::Echo { enabled } => out.push(u8::from(*enabled)),
            CommandKind::Scroll { direction } => out.push(direction.code()),
            CommandKind::KeypadMode { mode } => out.push(mode.code()),
            CommandKind::OffHook
            | CommandKind::OnHook
            | CommandKind::RingOff
            | CommandKind::Identify => {}
        }

        finish(out)
    }
}

impl ToTrain for MmiEvent {
    fn to_train(&self) -> Result<Train, EncodeError> {
        let (code, payload): (StatusCode, Vec<u8>) = match &self.kind {
            EventKind::OffHook => (StatusCode::OffHook, vec![]),
            EventKind::OnHook => (StatusCode::OnHook, vec![]),
            EventKind::KeyPress => (StatusCode::KeyPress, vec![]),
            EventKind::KeyRelease => (StatusCode::KeyRelease, vec![]),
            EventKind::PadPress { digit } => (StatusCode::PadPress, vec![*digit]),
            EventKind::PadRelease { digit } => (StatusCode::PadRelease, vec![*digit]),
            EventKind::MenuExit => (StatusCode::MenuExit, vec![]),
            EventKind::MenuItem { item } => (StatusCode::MenuItem, vec![*item]),
            EventKind::ProgramResult { slot, ok } => {
                (StatusCode::ProgramResult, vec![*slot, u8::from(*ok)])
            }
            EventKind::Unknown { prefix, data } => {
                let mut out = prefix.to_vec();
                out.extend_from_slice(data);
                return finish(out);
            }
            EventKind::Up | EventKind::Lost => {
                return Err(EncodeError::NotTransmittable(self.kind.name()))
            }
        };

        let mut out = header(CLASS_STATUS, code as u8, &self.control)?;
        out.extend_from_slice(&payload);
        finish(out)
    }
}

/// Serialize a command into one or more chained blocks
pub fn mmi_to_dcp(command: &MmiCommand) -> Result<Train, EncodeError> {
    command.to_train()
}

/// Serialize a station event (station side of the link)
pub fn event_to_dcp(event: &MmiEvent) -> Result<Train, EncodeError> {
    event.to_train()
}

/// Parse one reassembled status message into an event
///
/// Never fails: an unrecognized prefix or a malformed payload yields
/// [`EventKind::Unknown`] carrying the raw bytes so the caller can log it.
/// The returned event's station is empty.
pub fn dcp_to_mmi(data: &[u8]) -> MmiEvent {
    match parse_event(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Unclassified DCP message ({}): {:02X?}", e, data);
            let mut prefix = [0u8; 2];
            let n = data.len().min(2);
            prefix[..n].copy_from_slice(&data[..n]);
            MmiEvent::bare(EventKind::Unknown {
                prefix,
                data: data[n..].to_vec(),
            })
        }
    }
}

/// Parse one reassembled command message (station side of the link)
pub fn dcp_to_command(data: &[u8]) -> Result<MmiCommand, ParseError> {
    let mut reader = Reader::new(data);
    let class = reader.u8()?;
    let opcode = reader.u8()?;
    if class != CLASS_COMMAND {
        return Err(ParseError::UnknownPrefix(class, opcode));
    }
    let opcode = CommandOpcode::try_from(opcode)?;
    let control = reader.control()?;

    let kind = match opcode {
        CommandOpcode::Led => CommandKind::Led {
            color: LedColor::try_from(reader.u8()?)?,
            mode: LedMode::try_from(reader.u8()?)?,
        },
        CommandOpcode::Program => CommandKind::Program {
            slot: reader.u8()?,
            text: reader.text("program text")?,
        },
        CommandOpcode::Text => CommandKind::Text {
            row: reader.u8()?,
            column: reader.u8()?,
            erase: EraseMode::try_from(reader.u8()?)?,
            text: reader.text("display text")?,
        },
        CommandOpcode::OffHook => CommandKind::OffHook,
        CommandOpcode::OnHook => CommandKind::OnHook,
        CommandOpcode::Ring => CommandKind::Ring {
            pattern: RingPattern::try_from(reader.u8()?)?,
        },
        CommandOpcode::RingOff => CommandKind::RingOff,
        CommandOpcode::Beep => CommandKind::Beep { tone: reader.u8()? },
        CommandOpcode::Timer => CommandKind::Timer {
            running: reader.flag()?,
        },
        CommandOpcode::Identify => CommandKind::Identify,
        CommandOpcode::Echo => CommandKind::Echo {
            enabled: reader.flag()?,
        },
        CommandOpcode::Scroll => CommandKind::Scroll {
            direction: ScrollDirection::try_from(reader.u8()?)?,
        },
        CommandOpcode::KeypadMode => CommandKind::KeypadMode {
            mode: KeypadMode::try_from(reader.u8()?)?,
        },
    };

    Ok(MmiCommand {
        station: String::new(),
        control,
        kind,
    })
}

/// Synthetic event signalling that a station link went away
pub fn link_lost() -> MmiEvent {
    MmiEvent::bare(EventKind::Lost)
}

/// Synthetic event signalling that a station link came up
pub fn link_up() -> MmiEvent {
    MmiEvent::bare(EventKind::Up)
}

fn parse_event(data: &[u8]) -> Result<MmiEvent, ParseError> {
    let mut reader = Reader::new(data);
    let class = reader.u8()?;
    let code = reader.u8()?;
    if class != CLASS_STATUS {
        return Err(ParseError::UnknownPrefix(class, code));
    }
    let code = StatusCode::try_from(code)?;
    let control = reader.control()?;

    let kind = match code {
        StatusCode::OffHook => EventKind::OffHook,
        StatusCode::OnHook => EventKind::OnHook,
        StatusCode::KeyPress => EventKind::KeyPress,
        StatusCode::KeyRelease => EventKind::KeyRelease,
        StatusCode::PadPress => EventKind::PadPress {
            digit: reader.u8()?,
        },
        StatusCode::PadRelease => EventKind::PadRelease {
            digit: reader.u8()?,
        },
        StatusCode::MenuExit => EventKind::MenuExit,
        StatusCode::MenuItem => EventKind::MenuItem { item: reader.u8()? },
        StatusCode::ProgramResult => EventKind::ProgramResult {
            slot: reader.u8()?,
            ok: reader.flag()?,
        },
    };

    Ok(MmiEvent {
        station: String::new(),
        control,
        kind,
    })
}

fn header(class: u8, opcode: u8, control: &str) -> Result<Vec<u8>, EncodeError> {
    let ctl_len =
        u8::try_from(control.len()).map_err(|_| EncodeError::ControlTooLong(control.len()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + control.len() + 8);
    out.push(class);
    out.push(opcode);
    out.push(ctl_len);
    out.extend_from_slice(control.as_bytes());
    Ok(out)
}

fn finish(out: Vec<u8>) -> Result<Train, EncodeError> {
    if out.len() > MAX_TRAIN_BYTES {
        return Err(EncodeError::TooLarge {
            len: out.len(),
            max: MAX_TRAIN_BLOCKS,
        });
    }
    Ok(Train::new(out))
}

/// Bounds-checked cursor over message bytes
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(ParseError::Truncated { needed: 1 })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let remaining = self.data.len() - self.pos;
        if remaining < len {
            return Err(ParseError::Truncated {
                needed: len - remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn flag(&mut self) -> Result<bool, ParseError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            code => Err(ParseError::InvalidCode { field: "flag", code }),
        }
    }

    fn control(&mut self) -> Result<String, ParseError> {
        let len = usize::from(self.u8()?);
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidText("control name"))
    }

    fn text(&mut self, what: &'static str) -> Result<String, ParseError> {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidText(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::Reassembler;

    fn reassemble(train: &Train) -> Vec<u8> {
        let mut reassembler = Reassembler::new();
        let mut out = None;
        for block in train.blocks() {
            out = reassembler.push(block.payload, block.more).unwrap();
        }
        out.expect("train did not complete")
    }

    #[test]
    fn test_encode_led() {
        let cmd = MmiCommand::led("set-1", "line1", LedColor::Green, LedMode::Flash);
        let train = mmi_to_dcp(&cmd).unwrap();
        assert_eq!(
            train.as_bytes(),
            &[0x81, 0x10, 5, b'l', b'i', b'n', b'e', b'1', 0x02, 0x02]
        );
        // Command left intact
        assert_eq!(cmd.control, "line1");
    }

    #[test]
    fn test_encode_bare_command() {
        let cmd = MmiCommand::new("set-1", "", CommandKind::Identify);
        let train = mmi_to_dcp(&cmd).unwrap();
        assert_eq!(train.as_bytes(), &[0x81, 0x41, 0]);
        assert_eq!(train.block_count(), 1);
    }

    #[test]
    fn test_parse_key_press() {
        let event = dcp_to_mmi(&[0x42, 0x03, 4, b'c', b'o', b'n', b'f']);
        assert_eq!(event.control, "conf");
        assert_eq!(event.kind, EventKind::KeyPress);
        assert!(event.station.is_empty());
    }

    #[test]
    fn test_parse_pad_press() {
        let event = dcp_to_mmi(&[0x42, 0x05, 0, b'7']);
        assert_eq!(event.kind, EventKind::PadPress { digit: b'7' });
    }

    #[test]
    fn test_unknown_prefix_yields_unknown_event() {
        let event = dcp_to_mmi(&[0x42, 0x6E, 0xDE, 0xAD]);
        assert_eq!(
            event.kind,
            EventKind::Unknown {
                prefix: [0x42, 0x6E],
                data: vec![0xDE, 0xAD],
            }
        );
    }

    #[test]
    fn test_truncated_event_yields_unknown() {
        // Program result missing its status byte
        let event = dcp_to_mmi(&[0x42, 0x09, 0, 3]);
        assert!(event.is_unknown());

        let event = dcp_to_mmi(&[0x42]);
        assert_eq!(
            event.kind,
            EventKind::Unknown {
                prefix: [0x42, 0x00],
                data: vec![],
            }
        );
    }

    #[test]
    fn test_command_class_rejected_as_event() {
        let train = mmi_to_dcp(&MmiCommand::new("s", "", CommandKind::RingOff)).unwrap();
        assert!(dcp_to_mmi(train.as_bytes()).is_unknown());
    }

    #[test]
    fn test_parse_command_invalid_erase_mode() {
        let err = dcp_to_command(&[0x81, 0x12, 0, 1, 1, 0x09]).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidCode {
                field: "erase mode",
                code: 0x09
            }
        );
    }

    #[test]
    fn test_long_text_roundtrip_across_blocks() {
        let text: String = "0123456789".repeat(30);
        let cmd = MmiCommand::text("set-2", 2, 5, EraseMode::Line, text.clone());
        let train = mmi_to_dcp(&cmd).unwrap();
        assert_eq!(train.block_count(), 2);

        let parsed = dcp_to_command(&reassemble(&train)).unwrap();
        assert_eq!(
            parsed.kind,
            CommandKind::Text {
                row: 2,
                column: 5,
                erase: EraseMode::Line,
                text,
            }
        );
    }

    #[test]
    fn test_event_roundtrip() {
        let event = MmiEvent::new(
            "",
            "soft3",
            EventKind::ProgramResult { slot: 3, ok: true },
        );
        let train = event_to_dcp(&event).unwrap();
        assert_eq!(dcp_to_mmi(&reassemble(&train)), event);
    }

    #[test]
    fn test_synthetic_events_not_transmittable() {
        assert_eq!(
            event_to_dcp(&link_up()),
            Err(EncodeError::NotTransmittable("up"))
        );
        assert_eq!(link_lost().kind, EventKind::Lost);
    }

    #[test]
    fn test_control_too_long() {
        let cmd = MmiCommand::new("s", "x".repeat(300), CommandKind::OnHook);
        assert_eq!(mmi_to_dcp(&cmd), Err(EncodeError::ControlTooLong(300)));
    }

    #[test]
    fn test_message_too_large() {
        let cmd = MmiCommand::text("s", 0, 0, EraseMode::None, "x".repeat(MAX_TRAIN_BYTES));
        assert!(matches!(
            mmi_to_dcp(&cmd),
            Err(EncodeError::TooLarge { .. })
        ));
    }
}
