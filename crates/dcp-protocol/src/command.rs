//! Structured commands sent from the switching core to a station
//!
//! An [`MmiCommand`] names the station it targets, the control on that
//! station (a button lamp, the display, the ringer) and what to do with it.

use crate::error::ParseError;

/// Declares a one-byte wire vocabulary with `code()` and `TryFrom<u8>`
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal) {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Wire code for this value
            pub fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Every value, in code order
            pub const ALL: &'static [$name] = &[$(Self::$variant,)+];
        }

        impl TryFrom<u8> for $name {
            type Error = ParseError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(ParseError::InvalidCode { field: $field, code: value }),
                }
            }
        }
    };
}

wire_enum! {
    /// Lamp color of a button LED
    LedColor("led color") {
        /// Red lamp
        Red = 0x01,
        /// Green lamp
        Green = 0x02,
        /// Both lamps lit
        Amber = 0x03,
    }
}

wire_enum! {
    /// Lamp cadence of a button LED
    LedMode("led mode") {
        /// Lamp dark
        Off = 0x00,
        /// Steady on
        On = 0x01,
        /// Slow flash (held call)
        Flash = 0x02,
        /// Fast flash (alerting)
        Flutter = 0x03,
        /// Short blink (incoming on another line)
        Wink = 0x04,
        /// Inverted wink
        BrokenFlutter = 0x05,
    }
}

wire_enum! {
    /// What to clear before writing display text
    EraseMode("erase mode") {
        /// Overwrite in place
        None = 0x00,
        /// Clear from the cursor to the end of the row
        ToEndOfLine = 0x01,
        /// Clear the whole row
        Line = 0x02,
        /// Clear the whole display
        Display = 0x03,
    }
}

wire_enum! {
    /// Ringer cadence
    RingPattern("ring pattern") {
        /// Outside call
        Standard = 0x01,
        /// Inside call
        Intercom = 0x02,
        /// Priority call
        Priority = 0x03,
        /// Single short burst (call forwarded reminder)
        Splash = 0x04,
    }
}

wire_enum! {
    /// Display scroll direction
    ScrollDirection("scroll direction") {
        /// Scroll towards the first row
        Up = 0x01,
        /// Scroll towards the last row
        Down = 0x02,
        /// Scroll towards the first column
        Left = 0x03,
        /// Scroll towards the last column
        Right = 0x04,
    }
}

wire_enum! {
    /// How the dial pad reports presses
    KeypadMode("keypad mode") {
        /// Digits are dialed
        Dial = 0x00,
        /// Digits navigate the display menu
        Menu = 0x01,
        /// Digits select feature buttons
        Feature = 0x02,
    }
}

/// Kind-specific part of a command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandKind {
    /// Set a button lamp
    Led { color: LedColor, mode: LedMode },
    /// Program a softkey slot with a label
    Program { slot: u8, text: String },
    /// Write text to the display
    Text {
        row: u8,
        column: u8,
        erase: EraseMode,
        text: String,
    },
    /// Take the speakerphone off hook
    OffHook,
    /// Put the speakerphone on hook
    OnHook,
    /// Start ringing
    Ring { pattern: RingPattern },
    /// Stop ringing
    RingOff,
    /// Sound a single tone
    Beep { tone: u8 },
    /// Start or stop the call timer on the display
    Timer { running: bool },
    /// Ask the set to report its identity
    Identify,
    /// Enable or disable local echo of pad presses on the display
    Echo { enabled: bool },
    /// Scroll the display
    Scroll { direction: ScrollDirection },
    /// Switch the dial pad mode
    KeypadMode { mode: KeypadMode },
}

impl CommandKind {
    /// Short lowercase name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Led { .. } => "led",
            Self::Program { .. } => "program",
            Self::Text { .. } => "text",
            Self::OffHook => "offhook",
            Self::OnHook => "onhook",
            Self::Ring { .. } => "ring",
            Self::RingOff => "ringoff",
            Self::Beep { .. } => "beep",
            Self::Timer { .. } => "timer",
            Self::Identify => "identify",
            Self::Echo { .. } => "echo",
            Self::Scroll { .. } => "scroll",
            Self::KeypadMode { .. } => "keypad",
        }
    }
}

/// A command addressed to one control on one station
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MmiCommand {
    /// Hardware name of the target station (not carried on the wire)
    pub station: String,
    /// Control on the station, e.g. `line1` or `display`
    pub control: String,
    /// What to do
    pub kind: CommandKind,
}

impl MmiCommand {
    /// Create a command
    pub fn new(station: impl Into<String>, control: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            station: station.into(),
            control: control.into(),
            kind,
        }
    }

    /// Display text command
    pub fn text(
        station: impl Into<String>,
        row: u8,
        column: u8,
        erase: EraseMode,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            station,
            "display",
            CommandKind::Text {
                row,
                column,
                erase,
                text: text.into(),
            },
        )
    }

    /// Button lamp command
    pub fn led(
        station: impl Into<String>,
        control: impl Into<String>,
        color: LedColor,
        mode: LedMode,
    ) -> Self {
        Self::new(station, control, CommandKind::Led { color, mode })
    }

    /// Reset to an empty identify command, releasing owned strings
    pub fn clear(&mut self) {
        self.station.clear();
        self.control.clear();
        self.kind = CommandKind::Identify;
    }

    /// Same command addressed to another station
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = station.into();
        self
    }
}
