//! Frame header parsing and the batch walker.

use std::borrow::Cow;

use bytes::Bytes;

use crate::clean::clean_line;
use crate::error::FrameError;

/// Length of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Which standard stream a frame was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamType {
    /// `None` for any tag the engine does not write.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// A frame borrowed from a complete buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub stream: StreamType,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Payload as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.payload)
    }
}

/// A frame that owns its payload, as produced by [`crate::FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub stream: StreamType,
    pub payload: Bytes,
}

impl OwnedFrame {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Parse a header at the start of `buf`, returning the stream and payload length.
///
/// `Ok(None)` when fewer than [`HEADER_LEN`] bytes are available. A header
/// with an unknown tag or non-zero reserved bytes is an error.
pub(crate) fn parse_header(buf: &[u8]) -> Result<Option<(StreamType, usize)>, FrameError> {
    let Some(header) = buf.get(..HEADER_LEN) else {
        return Ok(None);
    };
    let mut bytes = [0u8; HEADER_LEN];
    bytes.copy_from_slice(header);

    let stream = match StreamType::from_tag(bytes[0]) {
        Some(stream) if bytes[1..4] == [0, 0, 0] => stream,
        _ => return Err(FrameError::InvalidHeader { header: bytes }),
    };
    let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    Ok(Some((stream, len)))
}

/// Iterator over the complete frames of a buffer.
///
/// Stops at the first frame whose header or payload is cut short, or whose
/// header is not a valid frame header. Calling
/// [`frames`] again on the same buffer restarts from the beginning.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Frames<'a> {
    /// Bytes not consumed by the frames yielded so far.
    pub fn remainder(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.buf[self.offset..];
        let (stream, len) = parse_header(rest).ok().flatten()?;
        let end = HEADER_LEN.checked_add(len)?;
        let payload = rest.get(HEADER_LEN..end)?;
        self.offset += end;
        Some(Frame { stream, payload })
    }
}

/// Walk the frames of a complete response body.
pub fn frames(buf: &[u8]) -> Frames<'_> {
    Frames { buf, offset: 0 }
}

/// Decode a complete body into cleaned, non-empty text lines.
pub fn demux_lines(buf: &[u8]) -> Vec<String> {
    frames(buf)
        .filter_map(|frame| clean_line(&frame.text()))
        .collect()
}

#[cfg(test)]
pub(crate) fn encode(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(tag);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}
