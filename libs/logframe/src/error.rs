//! Errors raised while decoding a live stream.

use thiserror::Error;

use crate::HEADER_LEN;

/// The live stream stopped looking like multiplexed frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Unknown stream tag or non-zero reserved bytes. Usually a TTY
    /// container, whose log is raw text.
    #[error("log stream is not multiplexed (header {header:02x?})")]
    InvalidHeader { header: [u8; HEADER_LEN] },

    /// A header declared a payload larger than the decoder will buffer.
    #[error("log frame of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },
}
