//! Block trains
//!
//! A physical frame carries at most [`MAX_BLOCK_PAYLOAD`] bytes. An encoded
//! message that is longer travels as a train: the message bytes sliced into
//! consecutive blocks, each marked with whether more blocks follow. The
//! receiving side feeds blocks to a [`Reassembler`] until one arrives with
//! the marker cleared.
//!
//! ```text
//!  message: [........................ 305 bytes ........................]
//!  blocks:  [ 255 bytes, more=true ][ 50 bytes, more=false ]
//! ```

use crate::error::ParseError;

/// Maximum payload bytes in one block
pub const MAX_BLOCK_PAYLOAD: usize = 255;

/// Maximum blocks a receiver accepts for one message
pub const MAX_TRAIN_BLOCKS: usize = 16;

/// Largest encoded message that fits in a train
pub const MAX_TRAIN_BYTES: usize = MAX_BLOCK_PAYLOAD * MAX_TRAIN_BLOCKS;

/// One block of a train
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Payload bytes, at most [`MAX_BLOCK_PAYLOAD`]
    pub payload: &'a [u8],
    /// More blocks of the same message follow
    pub more: bool,
}

/// An encoded message ready to be cut into blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Train {
    data: Vec<u8>,
}

impl Train {
    /// Wrap encoded message bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Encoded message bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the encoded message bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the train carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of blocks this train is cut into
    pub fn block_count(&self) -> usize {
        self.data.len().div_ceil(MAX_BLOCK_PAYLOAD)
    }

    /// Iterate over the blocks in transmission order
    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
        let count = self.block_count();
        self.data
            .chunks(MAX_BLOCK_PAYLOAD)
            .enumerate()
            .map(move |(i, payload)| Block {
                payload,
                more: i + 1 < count,
            })
    }
}

impl From<Vec<u8>> for Train {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// Collects blocks back into whole messages
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
    blocks: usize,
    /// Dropping the rest of an overlong train
    discarding: bool,
}

impl Reassembler {
    /// Create an empty reassembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one block
    ///
    /// Returns the complete message once a block without the more-follows
    /// marker arrives. A train longer than [`MAX_TRAIN_BLOCKS`] is reported
    /// once as an error, and its remaining blocks up to and including the
    /// last one are dropped without starting a new message.
    pub fn push(&mut self, payload: &[u8], more: bool) -> Result<Option<Vec<u8>>, ParseError> {
        if self.discarding {
            self.discarding = more;
            return Ok(None);
        }

        if self.blocks == MAX_TRAIN_BLOCKS {
            self.clear();
            self.discarding = more;
            return Err(ParseError::TrainTooLong {
                max: MAX_TRAIN_BLOCKS,
            });
        }

        self.buffer.extend_from_slice(payload);
        self.blocks += 1;

        if more {
            return Ok(None);
        }

        self.blocks = 0;
        Ok(Some(std::mem::take(&mut self.buffer)))
    }

    /// Drop any partial message
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.blocks = 0;
        self.discarding = false;
    }

    /// Whether a partial message is buffered or an overlong train is being dropped
    pub fn is_pending(&self) -> bool {
        self.blocks > 0 || self.discarding
    }

    /// Bytes of the partial message buffered so far
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
