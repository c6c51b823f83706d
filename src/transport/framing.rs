//! # Stream Framing
//!
//! Turns a TCP byte stream into the message-oriented channel sessions
//! expect: each frame says whether it carries binary data, UTF-8 text or a
//! close request.
//!
//! ## Wire Format
//! ```text
//! [Kind(1)] [Length(4, big-endian)] [Payload(N)]
//! ```
//! Kinds: `0x01` binary, `0x02` text, `0x08` close (empty payload).
//!
//! Lengths above the configured maximum are rejected before any allocation.

use crate::config::MAX_FRAME_SIZE;
use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const KIND_BINARY: u8 = 0x01;
pub const KIND_TEXT: u8 = 0x02;
pub const KIND_CLOSE: u8 = 0x08;

/// Kind byte plus length prefix
pub const HEADER_LEN: usize = 5;

/// One unit on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Binary(Bytes),
    Text(String),
    Close,
}

impl WireFrame {
    fn kind(&self) -> u8 {
        match self {
            WireFrame::Binary(_) => KIND_BINARY,
            WireFrame::Text(_) => KIND_TEXT,
            WireFrame::Close => KIND_CLOSE,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            WireFrame::Binary(b) => b,
            WireFrame::Text(t) => t.as_bytes(),
            WireFrame::Close => &[],
        }
    }
}

/// Tokio codec for [`WireFrame`]s
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = WireFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let kind = src[0];
        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(len));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();

        match kind {
            KIND_BINARY => Ok(Some(WireFrame::Binary(payload))),
            KIND_TEXT => String::from_utf8(payload.to_vec())
                .map(|text| Some(WireFrame::Text(text)))
                .map_err(|_| ProtocolError::TransportError(constants::ERR_INVALID_UTF8.into())),
            KIND_CLOSE => Ok(Some(WireFrame::Close)),
            other => Err(ProtocolError::TransportError(format!(
                "Unknown frame kind: {other:#04x}"
            ))),
        }
    }
}

impl Encoder<WireFrame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: WireFrame, dst: &mut BytesMut) -> Result<()> {
        let payload = frame.payload();
        if payload.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(payload.len()));
        }

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u8(frame.kind());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(payload);
        Ok(())
    }
}
