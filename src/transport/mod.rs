//! # Transport Layer
//!
//! Message-oriented TCP transport for sessions.
//!
//! ## Components
//! - **Framing**: kind + length framed binary/text/close units
//! - **TCP**: connect, service handshake and per-connection pump

pub mod framing;
pub mod tcp;
