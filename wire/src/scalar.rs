mod sealed {
    pub trait Sealed {}
}

/// A fixed-width numeric primitive with a little-endian wire representation.
///
/// Implemented for `i8`, `i16`, `i32`, `i64`, `f32` and `f64` only. Every bit pattern of these
/// types is a valid value, so decoding a scalar never fails once enough bytes are available.
pub trait Scalar: Copy + sealed::Sealed {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Appends the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes a value from exactly `Self::SIZE` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl Scalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_scalar!(i8, i16, i32, i64, f32, f64);

/// Appends a whole slice of scalars to `out` in wire order, with a single
/// reservation up front.
pub(crate) fn extend_le<T: Scalar>(out: &mut Vec<u8>, values: &[T]) {
    out.reserve(values.len() * T::SIZE);
    for value in values {
        value.write_le(out);
    }
}

#[test]
fn scalar_sizes() {
    assert_eq!(i8::SIZE, 1);
    assert_eq!(i16::SIZE, 2);
    assert_eq!(i32::SIZE, 4);
    assert_eq!(i64::SIZE, 8);
    assert_eq!(f32::SIZE, 4);
    assert_eq!(f64::SIZE, 8);
}

#[test]
fn extend_le_matches_element_wise() {
    let values = [1i32, -2, 0x0102_0304, i32::MIN];
    let mut bulk = Vec::new();
    extend_le(&mut bulk, &values);

    let mut each = Vec::new();
    for value in values {
        value.write_le(&mut each);
    }
    assert_eq!(bulk, each);
    assert_eq!(&bulk[..4], &[1, 0, 0, 0]);
    assert_eq!(&bulk[8..12], &[0x04, 0x03, 0x02, 0x01]);

    let mut floats = Vec::new();
    extend_le(&mut floats, &[1.0f32, -2.5]);
    assert_eq!(floats, [0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]);
}

#[test]
fn read_le_floats() {
    assert_eq!(f32::read_le(&[0x00, 0x00, 0x80, 0x3F]), 1.0);
    assert_eq!(f32::read_le(&[0x00, 0x00, 0x20, 0xC0]), -2.5);
    assert_eq!(f64::read_le(&1.5f64.to_le_bytes()), 1.5);
}
