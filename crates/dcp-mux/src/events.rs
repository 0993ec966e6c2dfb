//! Unified event stream for the multiplexer
//!
//! Everything the multiplexer has to tell its owner arrives through a
//! single bounded channel: decoded station events, decoded commands (when
//! the multiplexer sits on the station side of a link), and link status
//! changes. Link status travels as the synthetic [`EventKind::Up`] and
//! [`EventKind::Lost`] events, so one consumer loop handles both.

use dcp_protocol::{EventKind, MmiCommand, MmiEvent};

use crate::state::InterfaceId;

/// Transport-level view of a link status event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The station link completed training
    Up,
    /// The station link went away
    Down,
}

impl TransportStatus {
    /// Status code: zero for up, negative for down
    pub fn code(&self) -> i32 {
        match self {
            Self::Up => 0,
            Self::Down => -1,
        }
    }
}

/// Event emitted by the multiplexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    /// Station event or link status change on an interface
    Event {
        /// Interface the event arrived on
        id: InterfaceId,
        /// Decoded event, station set to the interface's hardware name
        event: MmiEvent,
    },

    /// Command received on an interface (station side of a link)
    Command {
        /// Interface the command arrived on
        id: InterfaceId,
        /// Decoded command, station set to the interface's hardware name
        command: MmiCommand,
    },
}

impl MuxEvent {
    /// Interface this event belongs to
    pub fn interface(&self) -> InterfaceId {
        match self {
            MuxEvent::Event { id, .. } | MuxEvent::Command { id, .. } => *id,
        }
    }

    /// Whether this carries a command rather than an event
    pub fn is_command(&self) -> bool {
        matches!(self, MuxEvent::Command { .. })
    }

    /// Link status carried by this event, if any
    pub fn transport_status(&self) -> Option<TransportStatus> {
        match self {
            MuxEvent::Event { event, .. } => match event.kind {
                EventKind::Up => Some(TransportStatus::Up),
                EventKind::Lost => Some(TransportStatus::Down),
                _ => None,
            },
            MuxEvent::Command { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_protocol::{link_lost, link_up, CommandKind};

    #[test]
    fn test_transport_status_classification() {
        let up = MuxEvent::Event {
            id: InterfaceId(3),
            event: link_up(),
        };
        assert_eq!(up.transport_status(), Some(TransportStatus::Up));
        assert_eq!(TransportStatus::Up.code(), 0);

        let lost = MuxEvent::Event {
            id: InterfaceId(3),
            event: link_lost(),
        };
        assert_eq!(lost.transport_status(), Some(TransportStatus::Down));
        assert!(TransportStatus::Down.code() < 0);

        let key = MuxEvent::Event {
            id: InterfaceId(3),
            event: MmiEvent::new("dcp3", "line1", EventKind::KeyPress),
        };
        assert_eq!(key.transport_status(), None);
    }

    #[test]
    fn test_interface_extraction() {
        let cmd = MuxEvent::Command {
            id: InterfaceId(42),
            command: MmiCommand::new("dcp42", "", CommandKind::Identify),
        };
        assert_eq!(cmd.interface(), InterfaceId(42));
        assert!(cmd.is_command());
        assert_eq!(cmd.transport_status(), None);
    }
}
