//! # Core Wire Components
//!
//! Value types, the binary codec and the two wire formats.
//!
//! ## Components
//! - **Types**: plain `Vector3` / `Quaternion` / `Matrix4x4` float structs
//! - **Codec**: chainable read/write cursor plus tag framing
//! - **Serialization**: binary frame and JSON envelope encoders
//!
//! ## Wire Format
//! ```text
//! Binary: [Tag(1)] [Payload(N)]
//! Text:   {"Id": <tag>, "Data": {<fields>}}
//! ```
//!
//! ## Safety
//! - Every read is bounds-checked against the frame
//! - String lengths are validated before allocation

pub mod codec;
pub mod serialization;
pub mod types;

pub use types::{Matrix4x4, Quaternion, Vector3};
