//! DCP Protocol Library
//!
//! This crate translates between the binary messages exchanged with DCP
//! digital keysets and a structured MMI vocabulary:
//!
//! - **Commands** ([`MmiCommand`]): switch → station, e.g. light a button
//!   lamp, write display text, start ringing
//! - **Events** ([`MmiEvent`]): station → switch, e.g. hook switch, button
//!   and dial pad presses, menu selections
//!
//! # Architecture
//!
//! Encoding produces a [`Train`]: the message bytes, cut into blocks of at
//! most [`MAX_BLOCK_PAYLOAD`] bytes with a more-follows marker. The receiving
//! side feeds blocks to a [`Reassembler`] and parses the completed message.
//! The crate does no I/O; framing blocks onto a transport is the
//! multiplexer's job.
//!
//! # Example
//!
//! ```rust
//! use dcp_protocol::{dcp_to_command, mmi_to_dcp, EraseMode, MmiCommand, Reassembler};
//!
//! let cmd = MmiCommand::text("set-12", 0, 0, EraseMode::Display, "Call from 4410");
//! let train = mmi_to_dcp(&cmd).unwrap();
//!
//! let mut reassembler = Reassembler::new();
//! let mut message = None;
//! for block in train.blocks() {
//!     message = reassembler.push(block.payload, block.more).unwrap();
//! }
//!
//! let parsed = dcp_to_command(&message.unwrap()).unwrap();
//! assert_eq!(parsed.kind, cmd.kind);
//! ```

pub mod command;
pub mod error;
pub mod event;
pub mod train;
pub mod transcode;

pub use command::{
    CommandKind, EraseMode, KeypadMode, LedColor, LedMode, MmiCommand, RingPattern,
    ScrollDirection,
};
pub use error::{EncodeError, ParseError};
pub use event::{EventKind, MmiEvent};
pub use train::{Block, Reassembler, Train, MAX_BLOCK_PAYLOAD, MAX_TRAIN_BLOCKS, MAX_TRAIN_BYTES};
pub use transcode::{
    dcp_to_command, dcp_to_mmi, event_to_dcp, link_lost, link_up, mmi_to_dcp, CommandOpcode,
    StatusCode, ToTrain, CLASS_COMMAND, CLASS_STATUS,
};
