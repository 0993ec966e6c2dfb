//! Structured events reported by a station
//!
//! Besides what the set itself reports (hook switch, buttons, dial pad,
//! menu), the same stream carries two synthetic events, [`EventKind::Up`]
//! and [`EventKind::Lost`], so a consumer handles link status and station
//! traffic in one place.

/// Kind-specific part of an event
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// Handset lifted
    OffHook,
    /// Handset replaced
    OnHook,
    /// Feature button pressed (the control names the button)
    KeyPress,
    /// Feature button released
    KeyRelease,
    /// Dial pad key pressed (`b'0'..=b'9'`, `b'*'`, `b'#'`)
    PadPress { digit: u8 },
    /// Dial pad key released
    PadRelease { digit: u8 },
    /// User left the display menu
    MenuExit,
    /// User picked a menu entry
    MenuItem { item: u8 },
    /// Outcome of a softkey programming command
    ProgramResult { slot: u8, ok: bool },
    /// Prefix or payload the transcoder did not recognize
    Unknown { prefix: [u8; 2], data: Vec<u8> },
    /// Station link came up
    Up,
    /// Station link went away
    Lost,
}

impl EventKind {
    /// Short lowercase name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::OffHook => "offhook",
            Self::OnHook => "onhook",
            Self::KeyPress => "keypress",
            Self::KeyRelease => "keyrelease",
            Self::PadPress { .. } => "padpress",
            Self::PadRelease { .. } => "padrelease",
            Self::MenuExit => "menuexit",
            Self::MenuItem { .. } => "menuitem",
            Self::ProgramResult { .. } => "program",
            Self::Unknown { .. } => "unknown",
            Self::Up => "up",
            Self::Lost => "lost",
        }
    }

    /// Whether this is one of the synthetic link status events
    pub fn is_link_status(&self) -> bool {
        matches!(self, Self::Up | Self::Lost)
    }
}

/// An event from one control on one station
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MmiEvent {
    /// Hardware name of the reporting station, filled in by the receiver
    pub station: String,
    /// Control that produced the event, empty when not applicable
    pub control: String,
    /// What happened
    pub kind: EventKind,
}

impl MmiEvent {
    /// Create an event
    pub fn new(station: impl Into<String>, control: impl Into<String>, kind: EventKind) -> Self {
        Self {
            station: station.into(),
            control: control.into(),
            kind,
        }
    }

    /// Payload-less event with no station or control
    pub fn bare(kind: EventKind) -> Self {
        Self::new(String::new(), String::new(), kind)
    }

    /// Reset to an empty lost event, releasing owned strings
    pub fn clear(&mut self) {
        self.station.clear();
        self.control.clear();
        self.kind = EventKind::Lost;
    }

    /// Same event attributed to another station
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = station.into();
        self
    }

    /// Whether the transcoder could not classify this event
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, EventKind::Unknown { .. })
    }
}
