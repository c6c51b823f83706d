//! # Error Types
//!
//! Error handling for the message transport and dispatch engine.
//!
//! This module defines every error variant that can occur while registering,
//! encoding, dispatching or sending messages.
//!
//! ## Error Categories
//! - **Receive-path errors**: unknown tags, missing handlers, malformed payloads.
//!   These are always recovered locally; the offending frame is dropped and the
//!   session stays open.
//! - **Send-path errors**: a transport that rejects a frame or is already closed.
//! - **Transport errors**: connection-level failures, which run the normal
//!   session-close path and never escalate further.
//! - **Configuration errors**: invalid or unreadable configuration.
//!
//! ## Example Usage
//! ```rust
//! use net_dispatch::error::{ProtocolError, Result};
//!
//! fn check_tag(tag: u8) -> Result<u8> {
//!     if tag == u8::MAX {
//!         return Err(ProtocolError::UnknownTag(tag));
//!     }
//!     Ok(tag)
//! }
//!
//! assert!(check_tag(7).is_ok());
//! assert!(matches!(check_tag(255), Err(ProtocolError::UnknownTag(255))));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Synchronisation errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Codec errors
    pub const ERR_UNEXPECTED_EOF: &str = "Unexpected end of buffer";
    pub const ERR_INVALID_UTF8: &str = "String payload is not valid UTF-8";
    pub const ERR_STRING_TOO_LONG: &str = "String length prefix exceeds remaining buffer";
    pub const ERR_EMPTY_FRAME: &str = "Empty frame";
    pub const ERR_SEEK_OUT_OF_RANGE: &str = "Seek position beyond end of buffer";

    /// Dispatch errors
    pub const ERR_TYPE_MISMATCH: &str = "Message instance does not match the bound type";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_SERVICE_MISMATCH: &str = "Requested service path does not match";
    pub const ERR_NOT_CONNECTED: &str = "Peer has no active session";
    pub const ERR_ALREADY_STARTED: &str = "Peer already started";
}

/// ProtocolError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Binary serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tag absent from the registry
    #[error("Unknown message tag: {0}")]
    UnknownTag(u8),

    /// Tag known, but no handler bound to it
    #[error("No handler bound for tag: {0}")]
    NoHandlerBound(u8),

    /// Malformed payload for the declared variant
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Transport rejected a frame or is closed
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// Connection-level failure surfaced by the transport
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Dispatch queue full ({0} pending)")]
    QueueFull(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error only affects a single frame and the session can carry on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownTag(_)
                | ProtocolError::NoHandlerBound(_)
                | ProtocolError::DecodeFailure(_)
                | ProtocolError::QueueFull(_)
                | ProtocolError::Serialization(_)
                | ProtocolError::Json(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
