//! # Binary Codec
//!
//! A chainable cursor that either writes fields into a growable buffer or
//! reads them back out, depending on the mode it was created in. Each `ser_*`
//! call takes a mutable reference to a field: in write mode the field is
//! appended, in read mode it is overwritten from the buffer. Because the same
//! call serves both directions, one routine describes a layout for encode and
//! decode alike.
//!
//! ## Wire Format
//! - Little-endian, fixed-width integers
//! - IEEE-754 floats (`f32` = 4 bytes, `f64` = 8 bytes)
//! - `bool` as a single byte, `0` or `1`
//! - Strings as a `u64` little-endian byte length followed by UTF-8 bytes
//! - Vectors, quaternions and matrices as their flat component sequence, no
//!   padding or alignment
//!
//! These are the same conventions the structural payload serializer uses, so
//! a hand-written layout and a derived one interoperate.
//!
//! ## Framing
//! ```text
//! [Tag(1)] [Payload(N)]
//! ```
//!
//! ## Usage
//! ```rust
//! use net_dispatch::core::codec::NetCodec;
//!
//! let (mut a, mut b, mut s) = (7u8, -3i32, String::from("hi"));
//! let mut writer = NetCodec::writer();
//! writer.ser_u8(&mut a)?.ser_i32(&mut b)?.ser_string(&mut s)?;
//!
//! let mut reader = NetCodec::reader(writer.to_vec());
//! let (mut a2, mut b2, mut s2) = (0u8, 0i32, String::new());
//! reader.ser_u8(&mut a2)?.ser_i32(&mut b2)?.ser_string(&mut s2)?;
//! assert_eq!((a2, b2, s2.as_str()), (7, -3, "hi"));
//! # Ok::<(), net_dispatch::error::ProtocolError>(())
//! ```

use crate::core::types::{Matrix4x4, Quaternion, Vector3};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{NetData, Tag};
use bytes::{BufMut, Bytes, BytesMut};

/// Default capacity of a fresh write buffer
const DEFAULT_WRITE_CAPACITY: usize = 256;

/// Direction a codec was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    Write,
    Read,
}

/// Read side: an immutable buffer plus a position
#[derive(Debug)]
pub struct ReadCursor {
    data: Bytes,
    pos: usize,
}

impl ReadCursor {
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ProtocolError::DecodeFailure(constants::ERR_UNEXPECTED_EOF.into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }
}

/// A value with a fixed binary layout.
pub trait WireField {
    fn write_to(&self, out: &mut BytesMut);

    fn read_from(cursor: &mut ReadCursor) -> Result<Self>
    where
        Self: Sized;
}

impl WireField for u8 {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(*self);
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        Ok(cursor.take_array::<1>()?[0])
    }
}

impl WireField for bool {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(u8::from(*self));
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        match cursor.take_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::DecodeFailure(format!(
                "Invalid bool byte: {other}"
            ))),
        }
    }
}

macro_rules! le_field {
    ($ty:ty, $put:ident, $n:expr) => {
        impl WireField for $ty {
            fn write_to(&self, out: &mut BytesMut) {
                out.$put(*self);
            }

            fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
                Ok(<$ty>::from_le_bytes(cursor.take_array::<$n>()?))
            }
        }
    };
}

le_field!(u16, put_u16_le, 2);
le_field!(i32, put_i32_le, 4);
le_field!(u32, put_u32_le, 4);
le_field!(i64, put_i64_le, 8);
le_field!(u64, put_u64_le, 8);
le_field!(f32, put_f32_le, 4);
le_field!(f64, put_f64_le, 8);

impl WireField for String {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_u64_le(self.len() as u64);
        out.put_slice(self.as_bytes());
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        let len = u64::read_from(cursor)?;
        if len > cursor.remaining().len() as u64 {
            return Err(ProtocolError::DecodeFailure(
                constants::ERR_STRING_TOO_LONG.into(),
            ));
        }
        let bytes = cursor.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::DecodeFailure(constants::ERR_INVALID_UTF8.into()))
    }
}

impl WireField for Vector3 {
    fn write_to(&self, out: &mut BytesMut) {
        for c in self.to_array() {
            c.write_to(out);
        }
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        Ok(Vector3::new(
            f32::read_from(cursor)?,
            f32::read_from(cursor)?,
            f32::read_from(cursor)?,
        ))
    }
}

impl WireField for Quaternion {
    fn write_to(&self, out: &mut BytesMut) {
        for c in self.to_array() {
            c.write_to(out);
        }
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        Ok(Quaternion::new(
            f32::read_from(cursor)?,
            f32::read_from(cursor)?,
            f32::read_from(cursor)?,
            f32::read_from(cursor)?,
        ))
    }
}

impl WireField for Matrix4x4 {
    fn write_to(&self, out: &mut BytesMut) {
        for row in &self.rows {
            for c in row {
                c.write_to(out);
            }
        }
    }

    fn read_from(cursor: &mut ReadCursor) -> Result<Self> {
        let mut m = Matrix4x4::default();
        for row in m.rows.iter_mut() {
            for c in row.iter_mut() {
                *c = f32::read_from(cursor)?;
            }
        }
        Ok(m)
    }
}

#[derive(Debug)]
enum Buffer {
    Write(BytesMut),
    Read(ReadCursor),
}

/// Bidirectional binary cursor. See the module docs for the wire format.
#[derive(Debug)]
pub struct NetCodec {
    buffer: Buffer,
}

impl Default for NetCodec {
    fn default() -> Self {
        Self::writer()
    }
}

impl NetCodec {
    /// Empty codec in write mode
    pub fn writer() -> Self {
        Self::with_capacity(DEFAULT_WRITE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Buffer::Write(BytesMut::with_capacity(capacity)),
        }
    }

    /// Codec in read mode over `data`, positioned at the start
    pub fn reader(data: impl Into<Bytes>) -> Self {
        Self {
            buffer: Buffer::Read(ReadCursor {
                data: data.into(),
                pos: 0,
            }),
        }
    }

    pub fn mode(&self) -> CodecMode {
        match self.buffer {
            Buffer::Write(_) => CodecMode::Write,
            Buffer::Read(_) => CodecMode::Read,
        }
    }

    pub fn is_writing(&self) -> bool {
        self.mode() == CodecMode::Write
    }

    /// Total bytes in the buffer
    pub fn len(&self) -> usize {
        match &self.buffer {
            Buffer::Write(out) => out.len(),
            Buffer::Read(cursor) => cursor.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current position. For a writer this equals `len()`.
    pub fn position(&self) -> usize {
        match &self.buffer {
            Buffer::Write(out) => out.len(),
            Buffer::Read(cursor) => cursor.pos,
        }
    }

    /// Unread bytes of a reader (empty for a writer)
    pub fn remaining(&self) -> &[u8] {
        match &self.buffer {
            Buffer::Write(_) => &[],
            Buffer::Read(cursor) => cursor.remaining(),
        }
    }

    /// Whole buffer contents regardless of position
    pub fn as_slice(&self) -> &[u8] {
        match &self.buffer {
            Buffer::Write(out) => out,
            Buffer::Read(cursor) => &cursor.data,
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Copy of the written bytes as a cheaply clonable `Bytes`
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    /// Rewind to an empty buffer for reuse. A writer keeps its capacity; a
    /// reader is repositioned at the start.
    pub fn reset(&mut self) {
        match &mut self.buffer {
            Buffer::Write(out) => out.clear(),
            Buffer::Read(cursor) => cursor.pos = 0,
        }
    }

    /// Reposition a reader. Writers cannot seek.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        match &mut self.buffer {
            Buffer::Write(_) => Err(ProtocolError::Custom(
                "seek is only supported in read mode".into(),
            )),
            Buffer::Read(cursor) => {
                if pos > cursor.data.len() {
                    return Err(ProtocolError::DecodeFailure(
                        constants::ERR_SEEK_OUT_OF_RANGE.into(),
                    ));
                }
                cursor.pos = pos;
                Ok(())
            }
        }
    }

    /// Write `value` or overwrite it from the buffer, depending on mode
    pub fn ser<F: WireField>(&mut self, value: &mut F) -> Result<&mut Self> {
        match &mut self.buffer {
            Buffer::Write(out) => value.write_to(out),
            Buffer::Read(cursor) => *value = F::read_from(cursor)?,
        }
        Ok(self)
    }

    pub fn ser_u8(&mut self, value: &mut u8) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_bool(&mut self, value: &mut bool) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_u16(&mut self, value: &mut u16) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_i32(&mut self, value: &mut i32) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_f32(&mut self, value: &mut f32) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_f64(&mut self, value: &mut f64) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_string(&mut self, value: &mut String) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_vector3(&mut self, value: &mut Vector3) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_quaternion(&mut self, value: &mut Quaternion) -> Result<&mut Self> {
        self.ser(value)
    }

    pub fn ser_matrix(&mut self, value: &mut Matrix4x4) -> Result<&mut Self> {
        self.ser(value)
    }

    /// Encode or decode the full payload of a message, depending on mode
    pub fn ser_message(&mut self, message: &mut dyn NetData) -> Result<&mut Self> {
        match &mut self.buffer {
            Buffer::Write(out) => message.write_payload(out)?,
            Buffer::Read(cursor) => {
                let mut rest = cursor.remaining();
                let before = rest.len();
                message.read_payload(&mut rest)?;
                let consumed = before - rest.len();
                cursor.pos += consumed;
            }
        }
        Ok(self)
    }

    /// Append the structural encoding of `message` (no tag)
    pub fn encode_message(&mut self, message: &dyn NetData) -> Result<&mut Self> {
        match &mut self.buffer {
            Buffer::Write(out) => message.write_payload(out)?,
            Buffer::Read(_) => {
                return Err(ProtocolError::Custom(
                    "encode_message requires a write-mode codec".into(),
                ))
            }
        }
        Ok(self)
    }

    /// Overwrite every field of `message` from the unread bytes
    pub fn decode_message(&mut self, message: &mut dyn NetData) -> Result<()> {
        if self.is_writing() {
            return Err(ProtocolError::Custom(
                "decode_message requires a read-mode codec".into(),
            ));
        }
        self.ser_message(message)?;
        Ok(())
    }

    /// Write a complete binary frame: the tag byte, then the payload
    pub fn frame(&mut self, message: &dyn NetData) -> Result<&mut Self> {
        let mut tag = message.tag();
        if !self.is_writing() {
            return Err(ProtocolError::Custom(
                "frame requires a write-mode codec".into(),
            ));
        }
        self.ser_u8(&mut tag)?;
        self.encode_message(message)
    }

    /// Read the tag byte at the front of a frame
    pub fn read_tag(&mut self) -> Result<Tag> {
        if self.is_writing() {
            return Err(ProtocolError::Custom(
                "read_tag requires a read-mode codec".into(),
            ));
        }
        if self.remaining().is_empty() {
            return Err(ProtocolError::DecodeFailure(constants::ERR_EMPTY_FRAME.into()));
        }
        let mut tag: Tag = 0;
        self.ser_u8(&mut tag)?;
        Ok(tag)
    }
}
