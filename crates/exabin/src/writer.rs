//! The buffered encode engine.
//!
//! [`WriteBuffer`] mirrors [`ReadBuffer`](crate::reader::ReadBuffer): a
//! fixed-capacity buffer in front of a byte sink. Primitive writes reserve
//! headroom first; when the buffer is short, everything written so far goes
//! to the sink in a single `write_all` call. Payloads at or above the
//! buffer capacity bypass the buffer entirely after a flush, so large
//! strings and byte runs never force a larger buffer.

use std::io::Write;

use crate::{
    encoding::TextEncoding,
    error::{Error, FormatError, Result},
    reader::MIN_CAPACITY,
    scalar::Scalar,
    wire,
};

/// A buffered, positional writer over a byte sink.
#[derive(Debug)]
pub struct WriteBuffer<W> {
    sink: W,
    buf: Box<[u8]>,
    /// Bytes of `buf` written and not yet flushed.
    len: usize,
    encoding: TextEncoding,
}

impl<W: Write> WriteBuffer<W> {
    /// Creates a writer over `sink`. `capacity` is clamped so that any
    /// primitive fits in the buffer whole.
    pub fn new(sink: W, encoding: TextEncoding, capacity: usize) -> Self {
        Self {
            sink,
            buf: vec![0u8; capacity.max(MIN_CAPACITY)].into_boxed_slice(),
            len: 0,
            encoding,
        }
    }

    /// The text encoding applied to chars and strings.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Makes room for `needed` more bytes, flushing buffered bytes to the
    /// sink when headroom is short.
    fn reserve(&mut self, needed: usize) -> Result<()> {
        debug_assert!(needed <= self.buf.len());
        if self.buf.len() - self.len < needed {
            self.flush_buffered()?;
        }
        Ok(())
    }

    fn flush_buffered(&mut self) -> Result<()> {
        if self.len > 0 {
            self.sink.write_all(&self.buf[..self.len])?;
            self.len = 0;
        }
        Ok(())
    }

    /// Flushes buffered bytes and the sink itself.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_buffered()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Writes one fixed-width primitive.
    pub fn write_scalar<S: Scalar>(&mut self, value: S) -> Result<()> {
        self.reserve(S::WIDTH)?;
        value.put_le(&mut self.buf[self.len..]);
        self.len += S::WIDTH;
        Ok(())
    }

    /// Writes a presence or continuation flag.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_scalar(value)
    }

    /// Writes a collection count prefix.
    pub fn write_count(&mut self, count: i32) -> Result<()> {
        self.write_scalar(count)
    }

    /// Writes one char: a raw byte under a single-byte encoding, otherwise
    /// a one-byte length followed by the encoded bytes.
    pub fn write_char(&mut self, value: char) -> Result<()> {
        let mut encoded = [0u8; 4];
        let len = self.encoding.encode_char(value, &mut encoded)?;
        if self.encoding.is_single_byte() {
            self.reserve(1)?;
            self.buf[self.len] = encoded[0];
            self.len += 1;
            return Ok(());
        }
        self.write_scalar(len as u8)?;
        self.write_bytes(&encoded[..len])
    }

    /// Writes a non-null string: u16 byte-length prefix plus the encoded
    /// bytes. Strings whose encoded form does not fit the prefix are
    /// rejected rather than silently truncated.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let encoded = self.encoding.encode_str(value)?;
        if encoded.len() >= wire::NULL_STRING as usize {
            return Err(FormatError::StringTooLong(encoded.len()).into());
        }
        self.write_scalar(encoded.len() as u16)?;
        self.write_bytes(&encoded)
    }

    /// Writes the null string sentinel.
    pub fn write_null_string(&mut self) -> Result<()> {
        self.write_scalar(wire::NULL_STRING)
    }

    /// Writes raw bytes, bypassing the buffer when the payload is at least
    /// as large as the buffer itself.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() >= self.buf.len() {
            self.flush_buffered()?;
            self.sink.write_all(bytes)?;
            return Ok(());
        }
        self.reserve(bytes.len())?;
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Writes a flat run of scalars. This is the bulk payload path for
    /// scalar arrays and collections.
    pub fn write_scalar_slice<S: Scalar>(&mut self, values: &[S]) -> Result<()> {
        for value in values {
            self.reserve(S::WIDTH)?;
            value.put_le(&mut self.buf[self.len..]);
            self.len += S::WIDTH;
        }
        Ok(())
    }

    /// Swaps in a new sink and returns the old one. The buffer must be
    /// flushed first; rebinding with pending bytes would misattribute them
    /// to the new sink.
    pub fn rebind(&mut self, sink: W) -> Result<W> {
        if self.len > 0 {
            return Err(Error::Contract("rebind with unflushed bytes in the buffer"));
        }
        Ok(std::mem::replace(&mut self.sink, sink))
    }

    /// Flushes buffered bytes and consumes the writer, returning the sink.
    pub fn into_sink(mut self) -> Result<W> {
        self.flush_buffered()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(capacity: usize) -> WriteBuffer<Vec<u8>> {
        WriteBuffer::new(Vec::new(), TextEncoding::Utf8, capacity)
    }

    #[test]
    fn scalars_are_buffered_until_flush() {
        let mut out = writer(64);
        out.write_scalar(0x12345678_i32).unwrap();
        let sink = out.into_sink().unwrap();
        assert_eq!(sink, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn small_buffer_flushes_between_writes() {
        let mut out = writer(0); // clamped to MIN_CAPACITY
        for v in 0..10u64 {
            out.write_scalar(v).unwrap();
        }
        let sink = out.into_sink().unwrap();
        assert_eq!(sink.len(), 80);
        assert_eq!(u64::get_le(&sink[72..]), 9);
    }

    #[test]
    fn string_wire_form() {
        let mut out = writer(64);
        out.write_str("hi").unwrap();
        out.write_str("").unwrap();
        out.write_null_string().unwrap();
        let sink = out.into_sink().unwrap();
        assert_eq!(sink, vec![0x02, 0x00, b'h', b'i', 0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn oversized_string_is_rejected() {
        let mut out = writer(64);
        let long = "x".repeat(0xFFFF);
        assert!(matches!(
            out.write_str(&long),
            Err(Error::Format(FormatError::StringTooLong(0xFFFF)))
        ));
    }

    #[test]
    fn payload_larger_than_the_buffer_bypasses_it() {
        let mut out = writer(0);
        out.write_scalar(1u8).unwrap();
        let payload = vec![0xAB; 100];
        out.write_bytes(&payload).unwrap();
        let sink = out.into_sink().unwrap();
        assert_eq!(sink[0], 1);
        assert_eq!(&sink[1..], &payload[..]);
    }

    #[test]
    fn char_wire_forms() {
        let mut out = writer(64);
        out.write_char('a').unwrap();
        out.write_char('漢').unwrap();
        let sink = out.into_sink().unwrap();
        let mut expected = vec![1, b'a', 3];
        expected.extend_from_slice("漢".as_bytes());
        assert_eq!(sink, expected);

        let mut latin = WriteBuffer::new(Vec::new(), TextEncoding::Latin1, 64);
        latin.write_char('é').unwrap();
        assert_eq!(latin.into_sink().unwrap(), vec![0xE9]);
    }

    #[test]
    fn rebind_requires_an_empty_buffer() {
        let mut out = writer(64);
        out.write_scalar(7u8).unwrap();
        assert!(matches!(out.rebind(Vec::new()), Err(Error::Contract(_))));

        out.flush().unwrap();
        let old = out.rebind(Vec::new()).unwrap();
        assert_eq!(old, vec![7]);
    }

    #[test]
    fn scalar_slice_round_trips_through_a_tiny_buffer() {
        let values: Vec<u32> = (0..100).collect();
        let mut out = writer(0);
        out.write_scalar_slice(&values).unwrap();
        let sink = out.into_sink().unwrap();
        assert_eq!(sink.len(), 400);
        assert_eq!(u32::get_le(&sink[396..]), 99);
    }
}
