//! Error types for DCP message parsing

use thiserror::Error;

/// Errors that can occur while parsing DCP message bytes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Message is shorter than its layout requires
    #[error("truncated message: need {needed} more bytes")]
    Truncated { needed: usize },

    /// Two-byte prefix does not name a known message
    #[error("unknown prefix: {0:02X} {1:02X}")]
    UnknownPrefix(u8, u8),

    /// A field carries a code outside its vocabulary
    #[error("invalid {field} code: 0x{code:02X}")]
    InvalidCode { field: &'static str, code: u8 },

    /// Control name or text is not valid UTF-8
    #[error("invalid UTF-8 in {0}")]
    InvalidText(&'static str),

    /// A train grew past the reassembly limit
    #[error("train exceeds {max} blocks")]
    TrainTooLong { max: usize },
}

/// Errors that can occur while encoding a message into a train
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Control name does not fit its one-byte length field
    #[error("control name too long: {0} bytes")]
    ControlTooLong(usize),

    /// Encoded message needs more blocks than a receiver will reassemble
    #[error("message of {len} bytes exceeds {max} blocks")]
    TooLarge { len: usize, max: usize },

    /// Synthetic link status events exist only on the receiving side
    #[error("{0} event cannot be transmitted")]
    NotTransmittable(&'static str),
}
