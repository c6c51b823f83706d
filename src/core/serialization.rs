//! # Wire Formats
//!
//! A message can travel in one of two formats:
//!
//! - **Binary**: `[Tag(1)][Payload(N)]`, payload encoded field by field in
//!   declaration order (see [`crate::core::codec`]).
//! - **Text**: a single JSON object `{"Id": <tag>, "Data": {<fields>}}` whose
//!   `Data` member mirrors the message's field names.
//!
//! ## Usage
//! ```rust
//! use net_dispatch::core::serialization::{encode, WireFormat, WirePayload};
//! use net_dispatch::protocol::messages::DemoMessage;
//!
//! let msg = DemoMessage { message: "hi".into() };
//! match encode(&msg, WireFormat::Text)? {
//!     WirePayload::Text(json) => assert_eq!(json, r#"{"Id":10,"Data":{"message":"hi"}}"#),
//!     WirePayload::Binary(_) => unreachable!(),
//! }
//! # Ok::<(), net_dispatch::error::ProtocolError>(())
//! ```

use crate::core::codec::NetCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{Envelope, NetData, Tag};
use bytes::Bytes;

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Tag byte + structural binary payload (compact, fastest)
    Binary,
    /// JSON envelope (human-readable, interop)
    #[default]
    Text,
}

impl WireFormat {
    /// `true` selects binary, `false` text
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            WireFormat::Binary
        } else {
            WireFormat::Text
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Binary => "Binary",
            WireFormat::Text => "Text",
        }
    }
}

/// An encoded message ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    Binary(Bytes),
    Text(String),
}

impl WirePayload {
    pub fn len(&self) -> usize {
        match self {
            WirePayload::Binary(b) => b.len(),
            WirePayload::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode `message` in the requested format
pub fn encode(message: &dyn NetData, format: WireFormat) -> Result<WirePayload> {
    match format {
        WireFormat::Binary => {
            let mut codec = NetCodec::writer();
            codec.frame(message)?;
            Ok(WirePayload::Binary(codec.to_bytes()))
        }
        WireFormat::Text => Ok(WirePayload::Text(message.to_envelope()?)),
    }
}

/// Encode into a reusable writer; the frame is whatever the writer holds
/// afterwards
pub fn encode_into(
    codec: &mut NetCodec,
    message: &dyn NetData,
    format: WireFormat,
) -> Result<WirePayload> {
    match format {
        WireFormat::Binary => {
            codec.reset();
            codec.frame(message)?;
            Ok(WirePayload::Binary(codec.to_bytes()))
        }
        WireFormat::Text => Ok(WirePayload::Text(message.to_envelope()?)),
    }
}

/// Split a text envelope into its tag and raw `Data` value
pub fn parse_envelope(text: &str) -> Result<(Tag, serde_json::Value)> {
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| ProtocolError::DecodeFailure(e.to_string()))?;
    Ok((envelope.id, envelope.data))
}
