use std::str;

use crate::error::{LengthKind, WireError};
use crate::scalar::{extend_le, Scalar};
use crate::MAX_LENGTH;

/// An ffire byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// let mut bb = ffire_wire::ByteBuffer::new(&[0x01, 0x02, 0x00, 0x68, 0x69]);
/// assert_eq!(bb.read_presence(), Ok(true));
/// assert_eq!(bb.read_string().as_deref(), Ok("hi"));
/// ```
///
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left after the current index.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    fn truncated(&self, needed: usize) -> WireError {
        WireError::Truncated {
            offset: self.index,
            needed,
            remaining: self.remaining(),
        }
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        match self.data.get(self.index) {
            Some(&value) => {
                self.index += 1;
                Ok(value)
            }
            None => Err(self.truncated(1)),
        }
    }

    /// Try to read `len` raw bytes starting at the current index. The slice
    /// aliases the underlying memory.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let value = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(value)
    }

    /// Try to read a boolean. Any nonzero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_byte()? != 0)
    }

    /// Try to read the presence flag in front of an optional value.
    pub fn read_presence(&mut self) -> Result<bool, WireError> {
        self.read_bool()
    }

    /// Try to read one little-endian scalar.
    pub fn read_scalar<T: Scalar>(&mut self) -> Result<T, WireError> {
        Ok(T::read_le(self.read_bytes(T::SIZE)?))
    }

    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        Ok(self.read_byte()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        self.read_scalar()
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.read_scalar()
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        self.read_scalar()
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        self.read_scalar()
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        self.read_scalar()
    }

    /// Try to read the little-endian `u16` prefix of a string or array.
    pub fn read_len(&mut self) -> Result<usize, WireError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
    }

    /// Try to read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_len()?;
        let offset = self.index;
        let bytes = self.read_bytes(len)?;
        match str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_owned()),
            Err(_) => Err(WireError::InvalidUtf8 { offset }),
        }
    }

    /// Try to read a length-prefixed array of scalars in one bounds check.
    pub fn read_scalar_vec<T: Scalar>(&mut self) -> Result<Vec<T>, WireError> {
        let count = self.read_len()?;
        let bytes = self.read_bytes(count * T::SIZE)?;
        Ok(bytes.chunks_exact(T::SIZE).map(T::read_le).collect())
    }
}

/// An ffire byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// let mut bb = ffire_wire::ByteBufferMut::new();
/// bb.write_presence(true);
/// bb.write_string("hi").unwrap();
/// assert_eq!(bb.data(), [0x01, 0x02, 0x00, 0x68, 0x69]);
/// ```
///
#[derive(Debug, Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Creates an empty buffer with room for `capacity` bytes, typically the
    /// encoded size of the value about to be written.
    pub fn with_capacity(capacity: usize) -> ByteBufferMut {
        ByteBufferMut {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reserves room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a boolean value to the end of the buffer.
    pub fn write_bool(&mut self, value: bool) {
        self.data.push(value as u8);
    }

    /// Write the presence flag of an optional value.
    pub fn write_presence(&mut self, present: bool) {
        self.write_bool(present);
    }

    /// Write one little-endian scalar.
    pub fn write_scalar<T: Scalar>(&mut self, value: T) {
        value.write_le(&mut self.data);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.data.push(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_scalar(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_scalar(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_scalar(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_scalar(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_scalar(value);
    }

    /// Write the `u16` prefix of a string or array, failing if `len` does not fit.
    pub fn write_len(&mut self, len: usize, kind: LengthKind) -> Result<(), WireError> {
        if len > MAX_LENGTH {
            return Err(WireError::Capacity {
                kind,
                len,
                max: MAX_LENGTH,
            });
        }
        self.data.extend_from_slice(&(len as u16).to_le_bytes());
        Ok(())
    }

    /// Write the element count of an array.
    pub fn write_array_len(&mut self, len: usize) -> Result<(), WireError> {
        self.write_len(len, LengthKind::Array)
    }

    /// Write a length-prefixed UTF-8 string. Nothing is written if the string
    /// is too long.
    pub fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.write_len(value.len(), LengthKind::String)?;
        self.data.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Write a length-prefixed array of scalars, reserving space for the whole
    /// slice once.
    pub fn write_scalar_slice<T: Scalar>(&mut self, values: &[T]) -> Result<(), WireError> {
        self.write_array_len(values.len())?;
        extend_le(&mut self.data, values);
        Ok(())
    }
}

#[test]
fn read_bool() {
    let read = |bytes| ByteBuffer::new(bytes).read_bool();
    assert_eq!(read(&[]), Err(WireError::Truncated { offset: 0, needed: 1, remaining: 0 }));
    assert_eq!(read(&[0]), Ok(false));
    assert_eq!(read(&[1]), Ok(true));
    assert_eq!(read(&[2]), Ok(true));
    assert_eq!(read(&[255]), Ok(true));
}

#[test]
fn read_bytes() {
    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(2), Ok(&[1u8, 2][..]));
    assert_eq!(bb.read_bytes(0), Ok(&[][..]));
    assert_eq!(bb.read_bytes(4), Err(WireError::Truncated { offset: 2, needed: 4, remaining: 3 }));
    assert_eq!(bb.read_bytes(3), Ok(&[3u8, 4, 5][..]));
    assert_eq!(bb.remaining(), 0);
}

#[test]
fn read_integers() {
    assert_eq!(ByteBuffer::new(&[0xFF]).read_i8(), Ok(-1));
    assert_eq!(ByteBuffer::new(&[0x34, 0x12]).read_i16(), Ok(0x1234));
    assert_eq!(ByteBuffer::new(&[0xFE, 0xFF, 0xFF, 0xFF]).read_i32(), Ok(-2));
    assert_eq!(
        ByteBuffer::new(&[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]).read_i64(),
        Ok(0x0102_0304_0506_0708)
    );
    assert!(matches!(ByteBuffer::new(&[0x01, 0x02, 0x03]).read_i32(), Err(WireError::Truncated { .. })));
}

#[test]
fn read_floats() {
    let mut bb = ByteBuffer::new(&[0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]);
    assert_eq!(bb.read_f32(), Ok(1.0));
    assert_eq!(bb.read_f32(), Ok(-2.5));
    assert_eq!(ByteBuffer::new(&(-0.125f64).to_le_bytes()).read_f64(), Ok(-0.125));
}

#[test]
fn read_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_string();
    assert_eq!(read(&[0, 0]), Ok(String::new()));
    assert_eq!(read(&[2, 0, 104, 105]), Ok("hi".to_owned()));
    assert_eq!(read(&[4, 0, 240, 159, 141, 149]), Ok("🍕".to_owned()));
    assert_eq!(read(&[3, 0, 104, 105]), Err(WireError::Truncated { offset: 2, needed: 3, remaining: 2 }));
    assert_eq!(read(&[1]), Err(WireError::Truncated { offset: 0, needed: 2, remaining: 1 }));
    assert_eq!(read(&[1, 0, 0xFF]), Err(WireError::InvalidUtf8 { offset: 2 }));
}

#[test]
fn read_scalar_vec() {
    let mut bb = ByteBuffer::new(&[3, 0, 1, 0, 2, 0, 3, 0]);
    assert_eq!(bb.read_scalar_vec::<i16>(), Ok(vec![1, 2, 3]));
    assert_eq!(ByteBuffer::new(&[0, 0]).read_scalar_vec::<f64>(), Ok(vec![]));
    assert!(matches!(
        ByteBuffer::new(&[2, 0, 1, 0, 0, 0]).read_scalar_vec::<i32>(),
        Err(WireError::Truncated { needed: 8, .. })
    ));
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_bool() {
    assert_eq!(write_once(|bb| bb.write_bool(false)), [0]);
    assert_eq!(write_once(|bb| bb.write_bool(true)), [1]);
    assert_eq!(write_once(|bb| bb.write_presence(false)), [0]);
}

#[test]
fn write_integers() {
    assert_eq!(write_once(|bb| bb.write_i8(-128)), [0x80]);
    assert_eq!(write_once(|bb| bb.write_i16(-2)), [0xFE, 0xFF]);
    assert_eq!(write_once(|bb| bb.write_i32(1)), [1, 0, 0, 0]);
    assert_eq!(
        write_once(|bb| bb.write_i64(i64::MIN)),
        [0, 0, 0, 0, 0, 0, 0, 0x80]
    );
}

#[test]
fn write_floats() {
    assert_eq!(write_once(|bb| bb.write_f32(1.0)), [0x00, 0x00, 0x80, 0x3F]);
    assert_eq!(write_once(|bb| bb.write_f32(-2.5)), [0x00, 0x00, 0x20, 0xC0]);
    assert_eq!(
        write_once(|bb| bb.write_f64(1.0)),
        [0, 0, 0, 0, 0, 0, 0xF0, 0x3F]
    );
}

#[test]
fn write_string() {
    assert_eq!(write_once(|bb| bb.write_string("").unwrap()), [0, 0]);
    assert_eq!(write_once(|bb| bb.write_string("hi").unwrap()), [2, 0, 104, 105]);
    assert_eq!(
        write_once(|bb| bb.write_string("🍕").unwrap()),
        [4, 0, 240, 159, 141, 149]
    );
}

#[test]
fn write_string_capacity() {
    let mut bb = ByteBufferMut::new();
    let max = "a".repeat(MAX_LENGTH);
    assert_eq!(bb.write_string(&max), Ok(()));
    assert_eq!(bb.len(), 2 + MAX_LENGTH);
    assert_eq!(&bb.as_slice()[..2], &[0xFF, 0xFF]);

    let mut bb = ByteBufferMut::new();
    let over = "a".repeat(MAX_LENGTH + 1);
    assert_eq!(
        bb.write_string(&over),
        Err(WireError::Capacity { kind: LengthKind::String, len: MAX_LENGTH + 1, max: MAX_LENGTH })
    );
    assert!(bb.is_empty());
}

#[test]
fn write_scalar_slice() {
    assert_eq!(
        write_once(|bb| bb.write_scalar_slice(&[1i32, 2, 3]).unwrap()),
        [3, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]
    );
    assert_eq!(write_once(|bb| bb.write_scalar_slice::<f32>(&[]).unwrap()), [0, 0]);
    assert_eq!(write_once(|bb| bb.write_scalar_slice(&[-1i8, 2]).unwrap()), [2, 0, 0xFF, 2]);

    let mut bb = ByteBufferMut::new();
    assert!(bb.write_scalar_slice(&vec![0i8; MAX_LENGTH]).is_ok());
    assert!(matches!(
        bb.write_scalar_slice(&vec![0i8; MAX_LENGTH + 1]),
        Err(WireError::Capacity { kind: LengthKind::Array, .. })
    ));
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_i64(7);
    bb.write_presence(true);
    bb.write_string("ok").unwrap();
    bb.write_array_len(0).unwrap();
    let data = bb.data();
    assert_eq!(data, [7, 0, 0, 0, 0, 0, 0, 0, 1, 2, 0, b'o', b'k', 0, 0]);

    let mut rb = ByteBuffer::new(&data);
    assert_eq!(rb.read_i64(), Ok(7));
    assert_eq!(rb.read_presence(), Ok(true));
    assert_eq!(rb.read_string(), Ok("ok".to_owned()));
    assert_eq!(rb.read_len(), Ok(0));
    assert_eq!(rb.index(), data.len());
}
