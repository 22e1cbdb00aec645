//! The buffered decode engine.
//!
//! [`ReadBuffer`] owns a byte source and a fixed-capacity buffer. Every
//! primitive read goes through [`ReadBuffer::ensure`], which compacts the
//! unread tail to the front of the buffer and then blocks on the source
//! until enough bytes are available. A source that ends mid-value raises
//! [`Error::Truncated`]; the engine never returns a partial value.
//!
//! Payloads larger than the buffer (long strings, byte runs) drain whatever
//! is buffered and then read the remainder directly from the source, so the
//! buffer capacity bounds memory, not value size.

use std::io::Read;

use crate::{
    encoding::TextEncoding,
    error::{Error, FormatError, Result},
    scalar::Scalar,
    wire,
};

/// Default buffer capacity for both engines.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Smallest usable capacity; every primitive must fit in the buffer whole.
pub(crate) const MIN_CAPACITY: usize = 16;

/// A buffered, positional reader over a byte source.
#[derive(Debug)]
pub struct ReadBuffer<R> {
    source: R,
    buf: Box<[u8]>,
    /// Next unread byte.
    pos: usize,
    /// Bytes of `buf` holding data from the source.
    filled: usize,
    encoding: TextEncoding,
}

impl<R: Read> ReadBuffer<R> {
    /// Creates a reader over `source`. `capacity` is clamped so that any
    /// primitive fits in the buffer whole.
    pub fn new(source: R, encoding: TextEncoding, capacity: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; capacity.max(MIN_CAPACITY)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            encoding,
        }
    }

    /// The text encoding applied to chars and strings.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Unread bytes currently buffered.
    fn available(&self) -> usize {
        self.filled - self.pos
    }

    /// Makes at least `needed` contiguous bytes available at `pos`,
    /// compacting first and then blocking on the source.
    fn ensure(&mut self, needed: usize) -> Result<()> {
        debug_assert!(needed <= self.buf.len());
        if self.available() >= needed {
            return Ok(());
        }

        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }

        while self.filled < needed {
            match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    return Err(Error::Truncated { needed, got: self.filled });
                }
                Ok(read) => self.filled += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Reads one fixed-width primitive.
    pub fn read_scalar<S: Scalar>(&mut self) -> Result<S> {
        self.ensure(S::WIDTH)?;
        let value = S::get_le(&self.buf[self.pos..]);
        self.pos += S::WIDTH;
        Ok(value)
    }

    /// Reads a presence or continuation flag; any nonzero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_scalar::<bool>()
    }

    /// Reads a collection count prefix without interpreting it.
    pub fn read_count(&mut self) -> Result<i32> {
        self.read_scalar::<i32>()
    }

    /// Reads one char: a raw byte under a single-byte encoding, otherwise
    /// a one-byte length (which must be nonzero) followed by the encoded
    /// bytes.
    pub fn read_char(&mut self) -> Result<char> {
        if self.encoding.is_single_byte() {
            self.ensure(1)?;
            let byte = self.buf[self.pos];
            self.pos += 1;
            return Ok(self.encoding.decode_char(&[byte])?);
        }

        let len = self.read_scalar::<u8>()? as usize;
        if len == 0 {
            return Err(FormatError::ZeroCharLength.into());
        }
        self.ensure(len)?;
        let ch = self.encoding.decode_char(&self.buf[self.pos..self.pos + len])?;
        self.pos += len;
        Ok(ch)
    }

    /// Reads a length-prefixed string. `None` is the null sentinel.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let len = self.read_scalar::<u16>()?;
        if len == wire::NULL_STRING {
            return Ok(None);
        }
        if len == 0 {
            return Ok(Some(String::new()));
        }
        let bytes = self.read_bytes(len as usize)?;
        Ok(Some(self.encoding.decode_bytes(&bytes)?))
    }

    /// Reads exactly `len` raw bytes, bypassing the buffer for the portion
    /// that exceeds what is buffered.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        let buffered = self.available().min(len);
        out[..buffered].copy_from_slice(&self.buf[self.pos..self.pos + buffered]);
        self.pos += buffered;

        let mut copied = buffered;
        while copied < len {
            match self.source.read(&mut out[copied..]) {
                Ok(0) => return Err(Error::Truncated { needed: len, got: copied }),
                Ok(read) => copied += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }

    /// Reads a flat run of `count` scalars, refilling the buffer between
    /// chunks. This is the bulk payload path for scalar arrays and
    /// collections.
    pub fn read_scalar_vec<S: Scalar>(&mut self, count: usize) -> Result<Vec<S>> {
        // The count came off the wire; grow instead of trusting it with a
        // huge preallocation.
        let mut out = Vec::with_capacity(count.min(4096));
        while out.len() < count {
            self.ensure(S::WIDTH)?;
            let whole = (self.available() / S::WIDTH).min(count - out.len());
            for _ in 0..whole {
                out.push(S::get_le(&self.buf[self.pos..]));
                self.pos += S::WIDTH;
            }
        }
        Ok(out)
    }

    /// Swaps in a new source, discarding any buffered bytes, and returns
    /// the old one.
    pub fn rebind(&mut self, source: R) -> R {
        self.pos = 0;
        self.filled = 0;
        std::mem::replace(&mut self.source, source)
    }

    /// Consumes the reader, returning the source. Buffered bytes that were
    /// read ahead are discarded.
    pub fn into_source(self) -> R {
        self.source
    }
}
