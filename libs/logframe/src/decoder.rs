//! Stateful decoder for live log streams.

use bytes::{Buf, BytesMut};

use crate::error::FrameError;
use crate::frame::{parse_header, OwnedFrame, HEADER_LEN};

/// Largest payload a [`FrameDecoder`] accepts by default. The engine splits
/// long lines into frames of 16 KiB, so real frames stay far below this.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Reassembles frames from a stream delivered in arbitrary chunks.
///
/// Bytes that do not yet form a complete frame are kept until the next
/// [`push`](Self::push). Because every accepted header declares at most
/// `max_frame_len` bytes, the buffer never holds more than one frame plus
/// the latest chunk.
#[derive(Debug)]
pub struct FrameDecoder {
    pending: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Append a chunk and return every frame it completes, in stream order.
    ///
    /// On error the buffer is cleared, along with any frames completed
    /// earlier in the same chunk; the stream cannot be resynchronised.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<OwnedFrame>, FrameError> {
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        loop {
            let (stream, len) = match parse_header(&self.pending) {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    self.pending.clear();
                    return Err(e);
                }
            };
            if len > self.max_frame_len {
                self.pending.clear();
                return Err(FrameError::TooLarge {
                    len,
                    limit: self.max_frame_len,
                });
            }
            if self.pending.len() < HEADER_LEN + len {
                break;
            }
            self.pending.advance(HEADER_LEN);
            let payload = self.pending.split_to(len).freeze();
            out.push(OwnedFrame { stream, payload });
        }
        Ok(out)
    }

    /// Number of buffered bytes waiting for the rest of their frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
