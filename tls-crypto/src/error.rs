//! Errors produced by the cryptographic provider interface and the key
//! schedule.

use std::fmt;

#[derive(Debug)]
pub enum CryptoError {
    /// AEAD decryption failed authentication — the record layer turns this
    /// into a `bad_record_mac` alert.
    AeadOpenFailure,

    /// A signature failed to verify, or the underlying library refused to
    /// produce one.
    SignatureInvalid,

    /// The HKDF backend refused an operation (almost always: an `Expand`
    /// output length the hash's block structure can't support).
    HkdfFailure,

    /// A cipher suite, group, or signature scheme this crate recognises on
    /// the wire but has no concrete implementation for.
    UnsupportedAlgorithm(&'static str),

    /// The CSPRNG failed to produce bytes.
    RngFailure,

    /// A key-exchange peer public value was malformed (wrong length, not
    /// on the curve) or agreement otherwise failed.
    KeyExchangeFailure,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AeadOpenFailure => write!(f, "AEAD authentication failed"),
            Self::SignatureInvalid => write!(f, "signature verification failed"),
            Self::HkdfFailure => write!(f, "HKDF operation failed"),
            Self::UnsupportedAlgorithm(what) => write!(f, "unsupported algorithm: {what}"),
            Self::RngFailure => write!(f, "random number generation failed"),
            Self::KeyExchangeFailure => write!(f, "key exchange failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

pub type Result<T> = std::result::Result<T, CryptoError>;
