//! HUA link framing
//!
//! Every block exchanged with a station travels in one link frame:
//!
//! ```text
//! [0xD5] [ctl] [id hi] [id lo] [len] [payload; len]
//! ```
//!
//! The low nibble of `ctl` is the frame kind, bit 4 marks a command train
//! and bit 5 means more blocks of the same train follow. Bits 6 and 7 are
//! reserved and must be zero.

use dcp_protocol::MAX_BLOCK_PAYLOAD;

use crate::state::InterfaceId;

/// Frame sync byte
pub const SYNC: u8 = 0xD5;

/// Bytes before the payload
pub const HEADER_LEN: usize = 5;

/// Largest frame on the wire
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_BLOCK_PAYLOAD;

const KIND_MASK: u8 = 0x0F;
const FLAG_COMMAND: u8 = 0x10;
const FLAG_MORE: u8 = 0x20;
const RESERVED_MASK: u8 = 0xC0;

/// Link frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// One block of a message train
    Data,
    /// Link training or keepalive probe
    Probe,
    /// Answer to a probe
    Ack,
    /// Link teardown
    Disconnect,
}

impl FrameKind {
    fn code(self) -> u8 {
        match self {
            FrameKind::Data => 0,
            FrameKind::Probe => 1,
            FrameKind::Ack => 2,
            FrameKind::Disconnect => 3,
        }
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Data),
            1 => Ok(FrameKind::Probe),
            2 => Ok(FrameKind::Ack),
            3 => Ok(FrameKind::Disconnect),
            other => Err(other),
        }
    }
}

/// A decoded link frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuaFrame {
    /// Interface the frame belongs to
    pub id: InterfaceId,
    /// Frame kind
    pub kind: FrameKind,
    /// Data frame of a command train
    pub command: bool,
    /// More blocks of the train follow
    pub more: bool,
    /// Block payload, at most [`MAX_BLOCK_PAYLOAD`] bytes
    pub payload: Vec<u8>,
}

impl HuaFrame {
    fn control(id: InterfaceId, kind: FrameKind, payload: Vec<u8>) -> Self {
        Self {
            id,
            kind,
            command: false,
            more: false,
            payload,
        }
    }

    /// Data frame carrying one block of a train
    pub fn data(id: InterfaceId, command: bool, more: bool, payload: Vec<u8>) -> Self {
        Self {
            id,
            kind: FrameKind::Data,
            command,
            more,
            payload,
        }
    }

    /// Probe frame advertising the logical channel
    pub fn probe(id: InterfaceId, lcn: u8) -> Self {
        Self::control(id, FrameKind::Probe, vec![lcn])
    }

    /// Probe acknowledgement
    pub fn ack(id: InterfaceId) -> Self {
        Self::control(id, FrameKind::Ack, Vec::new())
    }

    /// Link teardown notice
    pub fn disconnect(id: InterfaceId) -> Self {
        Self::control(id, FrameKind::Disconnect, Vec::new())
    }

    /// Serialize to wire bytes
    ///
    /// Payloads longer than one block are truncated; callers cut trains
    /// into blocks before framing.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len().min(MAX_BLOCK_PAYLOAD);
        let mut ctl = self.kind.code();
        if self.command {
            ctl |= FLAG_COMMAND;
        }
        if self.more {
            ctl |= FLAG_MORE;
        }

        let mut out = Vec::with_capacity(HEADER_LEN + len);
        out.push(SYNC);
        out.push(ctl);
        out.extend_from_slice(&self.id.0.to_be_bytes());
        out.push(len as u8);
        out.extend_from_slice(&self.payload[..len]);
        out
    }
}

/// Streaming decoder for link frames
///
/// Bytes are pushed as they arrive; complete frames are pulled out one at
/// a time. Garbage before a sync byte is discarded, and a header with an
/// invalid control byte costs one byte before the decoder resyncs. Only
/// bytes that cannot start a frame are ever dropped.
#[derive(Debug, Default)]
pub struct HuaCodec {
    buffer: Vec<u8>,
}

impl HuaCodec {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Append received bytes
    ///
    /// Nothing is discarded here. Once [`next_frame`](Self::next_frame) has
    /// returned `None` the buffer holds at most one partial frame, so a
    /// caller that drains after every push stays below [`MAX_FRAME_LEN`].
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<HuaFrame> {
        loop {
            let sync_pos = self.buffer.iter().position(|&b| b == SYNC);
            let Some(sync_pos) = sync_pos else {
                self.buffer.clear();
                return None;
            };
            if sync_pos > 0 {
                self.buffer.drain(..sync_pos);
            }

            if self.buffer.len() < HEADER_LEN {
                return None;
            }

            let ctl = self.buffer[1];
            let kind = match FrameKind::try_from(ctl & KIND_MASK) {
                Ok(kind) if ctl & RESERVED_MASK == 0 => kind,
                _ => {
                    tracing::warn!("Discarding HUA header with control byte {:02X}", ctl);
                    self.buffer.drain(..1);
                    continue;
                }
            };

            let len = self.buffer[4] as usize;
            if self.buffer.len() < HEADER_LEN + len {
                return None;
            }

            let id = InterfaceId(u16::from_be_bytes([self.buffer[2], self.buffer[3]]));
            let frame: Vec<u8> = self.buffer.drain(..HEADER_LEN + len).collect();

            return Some(HuaFrame {
                id,
                kind,
                command: ctl & FLAG_COMMAND != 0,
                more: ctl & FLAG_MORE != 0,
                payload: frame[HEADER_LEN..].to_vec(),
            });
        }
    }

    /// Bytes held waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
