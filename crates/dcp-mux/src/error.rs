//! Error types for the multiplexer

use thiserror::Error;

use crate::state::InterfaceId;

/// Errors that can occur in the multiplexer
#[derive(Debug, Error)]
pub enum MuxError {
    /// No interface registered under this id
    #[error("interface not found: {0}")]
    InterfaceNotFound(InterfaceId),

    /// Interface exists but its link is not trained
    #[error("interface {0} is not running")]
    NotRunning(InterfaceId),

    /// The filter refuses commands for this station
    #[error("commands for {hwname} (interface {id}) are filtered")]
    Filtered {
        /// Interface the command was addressed to
        id: InterfaceId,
        /// Hardware name the filter matched against
        hwname: String,
    },

    /// Zero-length payloads are not messages
    #[error("empty message")]
    EmptyMessage,

    /// The transport has been closed or lost
    #[error("transport closed")]
    TransportClosed,

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// `attach` was called outside a Tokio runtime
    #[error("no async runtime available for the worker")]
    NoRuntime,

    /// Command could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] dcp_protocol::EncodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
