//! Text encodings supported by the wire format.
//!
//! Chars and strings are the only encoding-dependent categories. Under a
//! single-byte encoding a char is one raw byte on the wire; under a
//! multi-byte encoding it is a one-byte length followed by the encoded
//! bytes. String payloads are the encoded bytes of the whole string, and
//! their u16 length prefix counts bytes, not chars.

use std::borrow::Cow;

use crate::error::FormatError;

/// The text encoding a reader or writer applies to chars and strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8, the default. Chars occupy one to four bytes.
    #[default]
    Utf8,
    /// ISO-8859-1. Every char is exactly one byte; code points above U+00FF
    /// are rejected rather than substituted.
    Latin1,
}

impl TextEncoding {
    /// Whether every char encodes to exactly one byte. Single-byte
    /// encodings skip the char length prefix entirely.
    pub const fn is_single_byte(self) -> bool {
        matches!(self, TextEncoding::Latin1)
    }

    /// Encodes one char into `buf`, returning the number of bytes used
    /// (1..=4).
    pub fn encode_char(self, ch: char, buf: &mut [u8; 4]) -> Result<usize, FormatError> {
        match self {
            TextEncoding::Utf8 => Ok(ch.encode_utf8(buf).len()),
            TextEncoding::Latin1 => {
                let cp = ch as u32;
                if cp > 0xFF {
                    return Err(FormatError::Unencodable(cp));
                }
                buf[0] = cp as u8;
                Ok(1)
            }
        }
    }

    /// Encodes a string, borrowing when the encoding is the identity.
    pub fn encode_str<'a>(self, value: &'a str) -> Result<Cow<'a, [u8]>, FormatError> {
        match self {
            TextEncoding::Utf8 => Ok(Cow::Borrowed(value.as_bytes())),
            TextEncoding::Latin1 => {
                let mut out = Vec::with_capacity(value.len());
                for ch in value.chars() {
                    let cp = ch as u32;
                    if cp > 0xFF {
                        return Err(FormatError::Unencodable(cp));
                    }
                    out.push(cp as u8);
                }
                Ok(Cow::Owned(out))
            }
        }
    }

    /// Decodes a whole string payload.
    pub fn decode_bytes(self, bytes: &[u8]) -> Result<String, FormatError> {
        match self {
            TextEncoding::Utf8 => {
                String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidText)
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Decodes exactly one char from `bytes`; trailing bytes are malformed.
    pub fn decode_char(self, bytes: &[u8]) -> Result<char, FormatError> {
        match self {
            TextEncoding::Utf8 => {
                let text = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidText)?;
                let mut chars = text.chars();
                let ch = chars.next().ok_or(FormatError::InvalidText)?;
                if chars.next().is_some() {
                    return Err(FormatError::InvalidText);
                }
                Ok(ch)
            }
            TextEncoding::Latin1 => match bytes {
                [byte] => Ok(*byte as char),
                _ => Err(FormatError::InvalidText),
            },
        }
    }
}
