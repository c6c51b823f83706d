//! # net-dispatch
//!
//! Typed message transport and dispatch engine.
//!
//! Messages are plain structs tagged with a one-byte [`Tag`]. They travel
//! either as a compact binary frame (`[Tag][Payload]`) or as a JSON envelope
//! (`{"Id": tag, "Data": {...}}`), are decoded on the transport threads into
//! pooled instances, and are handed to bound handlers only when the owning
//! thread calls `tick`.
//!
//! ## Features
//! - Explicit message registry built once at startup
//! - Chainable bidirectional binary codec
//! - Per-tag instance pool with RAII release
//! - Single-threaded handler dispatch fed by a shared queue
//! - Host and client peers over a framed TCP transport
//! - `tracing` logging, TOML/env configuration, atomic metrics
//!
//! ## Usage
//! ```rust
//! use net_dispatch::context::NetContext;
//! use net_dispatch::core::serialization::{encode, WireFormat, WirePayload};
//! use net_dispatch::protocol::dispatcher::Dispatcher;
//! use net_dispatch::protocol::messages::DemoMessage;
//! use net_dispatch::protocol::registry::MessageRegistry;
//! use net_dispatch::protocol::session::{DataSender, Session};
//! use std::sync::Arc;
//!
//! struct Discard;
//!
//! impl DataSender for Discard {
//!     fn send_binary(&self, _: bytes::Bytes) -> net_dispatch::Result<()> { Ok(()) }
//!     fn send_text(&self, _: String) -> net_dispatch::Result<()> { Ok(()) }
//!     fn close(&self) -> net_dispatch::Result<()> { Ok(()) }
//! }
//!
//! let ctx = NetContext::new(MessageRegistry::register_all());
//! let mut dispatcher = Dispatcher::<Vec<String>>::new(&ctx);
//! dispatcher.bind::<DemoMessage, _>(|log, _session, msg| {
//!     log.push(msg.message.clone());
//!     Ok(())
//! });
//!
//! let session = Arc::new(Session::new(dispatcher.data_handler(), Box::new(Discard)));
//! let WirePayload::Binary(frame) = encode(&DemoMessage { message: "hi".into() }, WireFormat::Binary)? else {
//!     unreachable!()
//! };
//! session.receive_binary(frame);
//!
//! let mut log = Vec::new();
//! assert_eq!(dispatcher.tick(&mut log), 1);
//! assert_eq!(log, vec!["hi".to_string()]);
//! # Ok::<(), net_dispatch::error::ProtocolError>(())
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use context::NetContext;
pub use error::{ProtocolError, Result};
pub use protocol::message::{Message, NetData, Tag};
