//! Fixed-width primitives and their little-endian byte layout.
//!
//! Every scalar occupies exactly [`Scalar::WIDTH`] bytes on the wire,
//! little-endian. Floats travel as their raw IEEE-754 bit patterns, which
//! under little-endian byte order is identical to transporting them through
//! the equally wide integer. Because scalar width is position-independent,
//! contiguous runs of scalars (array and collection payloads) can move
//! through the buffers in bulk.

mod sealed {
    pub trait Sealed {}
}

/// A primitive with a fixed little-endian wire width.
///
/// This trait is sealed; the wire format admits no further scalars.
pub trait Scalar: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes `self` to the first [`Self::WIDTH`] bytes of `out`.
    fn put_le(self, out: &mut [u8]);

    /// Reads a value from the first [`Self::WIDTH`] bytes of `src`.
    fn get_le(src: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Scalar for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn put_le(self, out: &mut [u8]) {
                out[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn get_le(src: &[u8]) -> Self {
                let mut raw = [0u8; Self::WIDTH];
                raw.copy_from_slice(&src[..Self::WIDTH]);
                Self::from_le_bytes(raw)
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl sealed::Sealed for bool {}

/// One byte on the wire; any nonzero byte decodes as `true`.
impl Scalar for bool {
    const WIDTH: usize = 1;

    #[inline]
    fn put_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn get_le(src: &[u8]) -> Self {
        src[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let mut buf = [0u8; 8];
        0x12345678_i32.put_le(&mut buf);
        assert_eq!(&buf[..4], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(i32::get_le(&buf), 0x12345678);

        0xA1B2_u16.put_le(&mut buf);
        assert_eq!(&buf[..2], &[0xB2, 0xA1]);
    }

    #[test]
    fn floats_travel_as_raw_bits() {
        let mut buf = [0u8; 8];
        1.5_f64.put_le(&mut buf);
        assert_eq!(u64::get_le(&buf), 1.5_f64.to_bits());
        assert_eq!(f64::get_le(&buf), 1.5);
    }

    #[test]
    fn bool_is_one_byte_and_nonzero_is_true() {
        let mut buf = [0u8; 1];
        true.put_le(&mut buf);
        assert_eq!(buf[0], 1);
        assert!(bool::get_le(&[0x02]));
        assert!(!bool::get_le(&[0x00]));
    }

    #[test]
    fn widths_match_the_wire_table() {
        assert_eq!(<bool as Scalar>::WIDTH, 1);
        assert_eq!(<u8 as Scalar>::WIDTH, 1);
        assert_eq!(<i16 as Scalar>::WIDTH, 2);
        assert_eq!(<u32 as Scalar>::WIDTH, 4);
        assert_eq!(<f32 as Scalar>::WIDTH, 4);
        assert_eq!(<i64 as Scalar>::WIDTH, 8);
        assert_eq!(<f64 as Scalar>::WIDTH, 8);
    }
}
