//! Something that can go wrong decoding or encoding a piece of the wire
//! format.

use std::fmt;

/// Errors produced by the codec primitives, the extension codec, and the
/// handshake message codec.
#[derive(Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The reader ran out of bytes before a field was fully read.
    Truncated,

    /// A length field claimed more bytes than remain in the enclosing frame.
    Overlong {
        /// The length the frame declared.
        stated_length: usize,
        /// The number of bytes actually available.
        available: usize,
    },

    /// A strictly-bounded enum (one with no GREASE/unknown fallback, such
    /// as `ContentType`) held a value outside its defined set.
    InvalidValue {
        /// The name of the field that failed to validate.
        field: &'static str,
        /// The value that was read.
        value: u64,
    },

    /// An encoder refused to write — almost always because a caller tried
    /// to construct a value whose length exceeds what its length prefix
    /// can represent (e.g. a vector longer than `2^24 - 1` for a 3-byte
    /// length prefix).
    EncodeShort {
        /// What was being encoded.
        what: &'static str,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated: reader ended mid-field"),
            Self::Overlong { stated_length, available } => {
                write!(f, "overlong: stated length {stated_length} exceeds {available} available bytes")
            }
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value {value} for {field}")
            }
            Self::EncodeShort { what } => write!(f, "refused to encode {what}: value too large for its length prefix"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Truncated,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
