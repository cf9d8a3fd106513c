//! Producer chunks and their normalization to bytes.

use bytes::Bytes;

use crate::error::{StreamError, StreamResult};

/// Declared encoding of a text chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// The string's UTF-8 bytes, unchanged.
    #[default]
    Utf8,
    /// One byte per char. Code points above U+00FF are rejected.
    Latin1,
    /// Hexadecimal digits, two per byte.
    Hex,
}

/// One unit of producer data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    Bytes(Bytes),
    Text { text: String, encoding: Encoding },
}

impl Chunk {
    /// A text chunk with an explicit encoding.
    pub fn text(text: impl Into<String>, encoding: Encoding) -> Self {
        Chunk::Text {
            text: text.into(),
            encoding,
        }
    }

    /// Normalize to the bytes that will be appended.
    pub fn into_bytes(self) -> StreamResult<Bytes> {
        match self {
            Chunk::Bytes(bytes) => Ok(bytes),
            Chunk::Text { text, encoding } => match encoding {
                Encoding::Utf8 => Ok(Bytes::from(text)),
                Encoding::Latin1 => latin1(&text),
                Encoding::Hex => hex::decode(text.trim())
                    .map(Bytes::from)
                    .map_err(|e| StreamError::InvalidArgument(format!("invalid hex chunk: {e}"))),
            },
        }
    }
}

fn latin1(text: &str) -> StreamResult<Bytes> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                StreamError::InvalidArgument(format!(
                    "code point U+{:04X} is outside Latin-1",
                    u32::from(c)
                ))
            })
        })
        .collect()
}

impl From<Bytes> for Chunk {
    fn from(bytes: Bytes) -> Self {
        Chunk::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Chunk::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<&[u8; N]> for Chunk {
    fn from(bytes: &[u8; N]) -> Self {
        Chunk::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::text(text, Encoding::Utf8)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::text(text, Encoding::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_text_is_passed_through() {
        let chunk = Chunk::from("héllo");
        assert_eq!(chunk.into_bytes().unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn latin1_one_byte_per_char() {
        let chunk = Chunk::text("é\u{ff}a", Encoding::Latin1);
        assert_eq!(chunk.into_bytes().unwrap(), &[0xe9, 0xff, b'a'][..]);
    }

    #[test]
    fn latin1_rejects_wide_code_points() {
        let err = Chunk::text("a\u{100}", Encoding::Latin1)
            .into_bytes()
            .unwrap_err();
        match err {
            StreamError::InvalidArgument(msg) => assert!(msg.contains("U+0100"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn hex_decodes() {
        let chunk = Chunk::text("00ff10", Encoding::Hex);
        assert_eq!(chunk.into_bytes().unwrap(), &[0x00, 0xff, 0x10][..]);
    }

    #[test]
    fn bad_hex_is_invalid_argument() {
        let err = Chunk::text("zz", Encoding::Hex).into_bytes().unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
    }

    #[test]
    fn byte_conversions() {
        assert_eq!(Chunk::from(b"abc").into_bytes().unwrap(), "abc");
        assert_eq!(Chunk::from(vec![1u8, 2]).into_bytes().unwrap(), &[1u8, 2][..]);
        assert_eq!(
            Chunk::from(&b"xy"[..]).into_bytes().unwrap(),
            Bytes::from_static(b"xy")
        );
    }
}
