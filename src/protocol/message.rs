//! # Message Model
//!
//! Every wire-addressable message is a plain Rust struct implementing
//! [`Message`]. The struct's fields, in declaration order, are its payload.
//!
//! The registry, pool and dispatch queue work with the object-safe
//! [`NetData`] trait instead, which every `Message` gets through a blanket
//! impl. That is how a decoded instance of an unknown-at-compile-time variant
//! can sit in a queue next to instances of other variants.
//!
//! ```rust
//! use net_dispatch::protocol::message::{Message, NetData};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
//! struct Ping {
//!     value: i32,
//! }
//!
//! impl Message for Ping {
//!     const TAG: u8 = 7;
//! }
//!
//! let boxed: Box<dyn NetData> = Box::new(Ping { value: 42 });
//! assert_eq!(boxed.tag(), 7);
//! assert_eq!(boxed.downcast_ref::<Ping>().map(|p| p.value), Some(42));
//! ```

use crate::error::{ProtocolError, Result};
use bincode::Options;
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;

/// Small unsigned integer identifying a message variant on the wire
pub type Tag = u8;

/// A concrete, statically typed message variant.
pub trait Message:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Debug + Send + Sync + 'static
{
    /// Wire tag of this variant. Must be unique within a registry.
    const TAG: Tag;
}

/// Object-safe view of a message instance.
pub trait NetData: Any + Debug + Send + Sync {
    /// Wire tag reported by this instance
    fn tag(&self) -> Tag;

    /// Rust type name of the concrete variant, for logs
    fn type_name(&self) -> &'static str;

    /// Restore every field to its zero/default value
    fn reset(&mut self);

    /// Append the structural encoding of all fields to `out`
    fn write_payload(&self, out: &mut BytesMut) -> Result<()>;

    /// Overwrite all fields from the front of `input`, advancing it past the
    /// consumed bytes
    fn read_payload(&mut self, input: &mut &[u8]) -> Result<()>;

    /// Render the `{"Id": tag, "Data": {...}}` text envelope
    fn to_envelope(&self) -> Result<String>;

    /// Overwrite all fields from the `Data` object of a text envelope.
    /// Fields missing from the object are set to their zero value.
    fn read_json(&mut self, data: serde_json::Value) -> Result<()>;

    /// Fresh zero-valued instance of the same variant
    fn new_default(&self) -> Box<dyn NetData>;

    /// Deep copy of this instance
    fn clone_boxed(&self) -> Box<dyn NetData>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn NetData {
    /// Whether this instance is of variant `M`
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }

    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn downcast_mut<M: Message>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }
}

/// Text envelope used on the JSON path: `{"Id": <tag>, "Data": <payload>}`
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "Id")]
    pub id: Tag,
    #[serde(rename = "Data")]
    pub data: T,
}

/// Bincode options shared by every payload: little-endian, fixed-width
/// integers, `u64` length prefix for strings and sequences.
pub(crate) fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

impl<M: Message> NetData for M {
    fn tag(&self) -> Tag {
        M::TAG
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn reset(&mut self) {
        *self = M::default();
    }

    fn write_payload(&self, out: &mut BytesMut) -> Result<()> {
        wire_options().serialize_into(BufMut::writer(&mut *out), self)?;
        Ok(())
    }

    fn read_payload(&mut self, input: &mut &[u8]) -> Result<()> {
        // Bounding by the input length keeps a forged length prefix from
        // allocating more than the frame actually holds.
        let limit = input.len() as u64;
        *self = wire_options()
            .with_limit(limit)
            .deserialize_from(&mut *input)
            .map_err(|e| ProtocolError::DecodeFailure(e.to_string()))?;
        Ok(())
    }

    fn to_envelope(&self) -> Result<String> {
        let envelope = Envelope {
            id: M::TAG,
            data: self,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn read_json(&mut self, data: serde_json::Value) -> Result<()> {
        // Keys absent from `data` keep their zero value
        let data = match (serde_json::to_value(M::default())?, data) {
            (Value::Object(mut fields), Value::Object(given)) => {
                fields.extend(given);
                Value::Object(fields)
            }
            (_, data) => data,
        };
        *self =
            serde_json::from_value(data).map_err(|e| ProtocolError::DecodeFailure(e.to_string()))?;
        Ok(())
    }

    fn new_default(&self) -> Box<dyn NetData> {
        Box::new(M::default())
    }

    fn clone_boxed(&self) -> Box<dyn NetData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
