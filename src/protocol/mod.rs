//! # Protocol Layer
//!
//! Message model, registry, sessions and the dispatch engine.
//!
//! ## Components
//! - **Message**: the typed `Message` trait and its object-safe `NetData` face
//! - **Registry**: frozen `Tag -> prototype` table
//! - **Messages**: built-in and sample variants
//! - **Session**: one logical connection over any transport
//! - **Dispatcher**: decode, queue, and run handlers on tick

pub mod dispatcher;
pub mod message;
pub mod messages;
pub mod registry;
pub mod session;


pub use dispatcher::Dispatcher;
pub use message::{Message, NetData, Tag};
pub use registry::MessageRegistry;
pub use session::{DataHandler, DataSender, Session};
