//! # Peer Roles
//!
//! Host and client wrappers that own a transport, a session list and a
//! dispatcher, and forward every tick to it.

pub mod client;
pub mod host;
pub mod peer;

pub use client::{ConnectionState, PeerClient};
pub use host::PeerHost;
pub use peer::PeerCore;
