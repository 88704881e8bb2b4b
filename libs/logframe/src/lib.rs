//! # fleetdeck-logframe
//!
//! Decoding of the container engine's multiplexed log stream.
//!
//! When a container runs without a TTY the engine interleaves stdout and
//! stderr on one byte stream. Every frame carries an 8-byte header:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! | stream |   0    |   0    |   0    |        payload length (BE u32)    |
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! followed by `length` bytes of payload.
//!
//! Two entry points are provided:
//!
//! - [`frames`] / [`demux_lines`] walk a complete response body. A truncated
//!   trailing frame ends the walk; the partial bytes are discarded.
//! - [`FrameDecoder`] is fed arbitrary chunks of a live, unbounded stream and
//!   keeps the unconsumed tail between calls, so a frame split across chunk
//!   boundaries is reassembled before it is yielded. It refuses headers
//!   that are not frame headers and payloads above its buffer limit, so a
//!   raw (TTY) stream fails fast instead of being buffered.

mod clean;
mod decoder;
mod error;
mod frame;

pub use clean::{clean_line, strip_ansi};
pub use decoder::{FrameDecoder, DEFAULT_MAX_FRAME_LEN};
pub use error::FrameError;
pub use frame::{demux_lines, frames, Frame, Frames, OwnedFrame, StreamType, HEADER_LEN};
