//! The error taxonomy for this crate, with its projection onto the
//! alert RFC 8446 wants sent for each failure.

use std::fmt;

use crate::alert::AlertDescription;

#[derive(Debug)]
pub enum HandshakeError {
    WireDecode(tls_wire::CodecError),
    UnexpectedContentType(u8),

    UnexpectedMessage { expected: &'static str, state: &'static str },
    IllegalParameter(&'static str),
    MissingExtension(&'static str),
    DuplicateExtension(&'static str),
    ExtensionInWrongContext(&'static str),

    AeadOpenFailure,
    SignatureInvalid,
    FinishedMismatch,
    HkdfFailure,

    AllocationFailed,
    SequenceNumberOverflow,

    Eof,
    Reset(std::io::Error),

    NoCommonCipher,
    NoCommonGroup,
    NoCommonSigAlg,

    /// A fatal alert was received from the peer.
    PeerAlert(AlertDescription),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WireDecode(inner) => write!(f, "wire decode error: {inner}"),
            Self::UnexpectedContentType(byte) => write!(f, "unexpected record content type {byte}"),
            Self::UnexpectedMessage { expected, state } => write!(f, "expected {expected} in state {state}"),
            Self::IllegalParameter(what) => write!(f, "illegal parameter: {what}"),
            Self::MissingExtension(what) => write!(f, "missing required extension: {what}"),
            Self::DuplicateExtension(what) => write!(f, "duplicate extension: {what}"),
            Self::ExtensionInWrongContext(what) => write!(f, "extension not permitted in this message: {what}"),
            Self::AeadOpenFailure => write!(f, "AEAD authentication failed"),
            Self::SignatureInvalid => write!(f, "signature verification failed"),
            Self::FinishedMismatch => write!(f, "Finished MAC did not match"),
            Self::HkdfFailure => write!(f, "HKDF operation failed"),
            Self::AllocationFailed => write!(f, "allocation failed"),
            Self::SequenceNumberOverflow => write!(f, "record sequence number overflowed"),
            Self::Eof => write!(f, "connection closed (EOF)"),
            Self::Reset(inner) => write!(f, "transport error: {inner}"),
            Self::NoCommonCipher => write!(f, "no mutually supported cipher suite"),
            Self::NoCommonGroup => write!(f, "no mutually supported key-exchange group"),
            Self::NoCommonSigAlg => write!(f, "no mutually supported signature scheme"),
            Self::PeerAlert(description) => write!(f, "peer sent alert {description:?}"),
        }
    }
}

impl std::error::Error for HandshakeError {}

impl From<tls_wire::CodecError> for HandshakeError {
    fn from(inner: tls_wire::CodecError) -> Self {
        Self::WireDecode(inner)
    }
}

impl From<tls_crypto::CryptoError> for HandshakeError {
    fn from(inner: tls_crypto::CryptoError) -> Self {
        match inner {
            tls_crypto::CryptoError::AeadOpenFailure => Self::AeadOpenFailure,
            tls_crypto::CryptoError::SignatureInvalid => Self::SignatureInvalid,
            tls_crypto::CryptoError::HkdfFailure | tls_crypto::CryptoError::RngFailure | tls_crypto::CryptoError::KeyExchangeFailure => {
                Self::HkdfFailure
            }
            tls_crypto::CryptoError::UnsupportedAlgorithm(_) => Self::NoCommonCipher,
        }
    }
}

impl From<std::io::Error> for HandshakeError {
    fn from(inner: std::io::Error) -> Self {
        if inner.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Eof
        } else {
            Self::Reset(inner)
        }
    }
}

impl HandshakeError {
    /// The alert this error should cause the local side to send, or
    /// `None` for errors that never reach the wire (transport errors
    /// propagate directly to the caller).
    #[must_use]
    pub fn as_alert(&self) -> Option<AlertDescription> {
        match self {
            Self::WireDecode(_) | Self::UnexpectedContentType(_) => Some(AlertDescription::DecodeError),
            Self::UnexpectedMessage { .. } => Some(AlertDescription::UnexpectedMessage),
            Self::IllegalParameter(_) | Self::DuplicateExtension(_) | Self::ExtensionInWrongContext(_) => {
                Some(AlertDescription::IllegalParameter)
            }
            Self::MissingExtension(_) => Some(AlertDescription::MissingExtension),
            Self::AeadOpenFailure => Some(AlertDescription::BadRecordMac),
            Self::SignatureInvalid | Self::FinishedMismatch => Some(AlertDescription::DecryptError),
            Self::HkdfFailure | Self::AllocationFailed | Self::SequenceNumberOverflow => Some(AlertDescription::InternalError),
            Self::NoCommonCipher | Self::NoCommonGroup | Self::NoCommonSigAlg => Some(AlertDescription::HandshakeFailure),
            Self::Eof | Self::Reset(_) | Self::PeerAlert(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
