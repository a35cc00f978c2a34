//! Runtime helpers for reading and writing the ffire wire format.
//!
//! Every value is encoded back to back with no envelope:
//!
//! - integers and floats are fixed-width little-endian (floats as their IEEE-754 bits),
//! - `bool` and optional presence flags are one byte (`0x00` / `0x01`),
//! - strings and arrays carry a little-endian `u16` length prefix.
//!
//! ```
//! use ffire_wire::*;
//!
//! let mut bb = ByteBufferMut::new();
//! bb.write_f32(1.0);
//! bb.write_f32(-2.5);
//! assert_eq!(bb.data(), [0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]);
//!
//! let mut bb = ByteBuffer::new(&[0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]);
//! assert_eq!(bb.read_scalar_vec::<i32>(), Ok(vec![1, 2, 3]));
//! ```

pub mod bb;
pub mod error;
pub mod scalar;

pub use bb::*;
pub use error::*;
pub use scalar::Scalar;

/// Largest string byte length or array element count that fits the `u16` prefix.
pub const MAX_LENGTH: usize = u16::MAX as usize;

/// Size of the length prefix in front of every string and array.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Size of the presence flag in front of every optional value.
pub const PRESENCE_SIZE: usize = 1;
