//! The small fixed enumerations named in the data model: handshake and
//! content types, cipher suites, named groups, and signature schemes.

use crate::codec::UnknownFallback;
use crate::error::CodecError;

/// `HandshakeType` — RFC 8446 §4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    ClientHello,
    ServerHello,
    NewSessionTicket,
    EndOfEarlyData,
    EncryptedExtensions,
    Certificate,
    CertificateRequest,
    CertificateVerify,
    Finished,
    KeyUpdate,
    /// Synthetic transcript-only entry substituted for the first
    /// ClientHello after a HelloRetryRequest. Never transmitted.
    MessageHash,
    /// A value this crate doesn't recognise.
    Unknown(u8),
}

impl UnknownFallback for HandshakeType {
    fn from_wire_value(value: u16) -> Self {
        Self::from(value as u8)
    }
    fn to_wire_value(self) -> u16 {
        u8::from(self) as u16
    }
}

impl From<u8> for HandshakeType {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::ClientHello,
            2 => Self::ServerHello,
            4 => Self::NewSessionTicket,
            5 => Self::EndOfEarlyData,
            8 => Self::EncryptedExtensions,
            11 => Self::Certificate,
            13 => Self::CertificateRequest,
            15 => Self::CertificateVerify,
            20 => Self::Finished,
            24 => Self::KeyUpdate,
            254 => Self::MessageHash,
            other => Self::Unknown(other),
        }
    }
}

impl From<HandshakeType> for u8 {
    fn from(t: HandshakeType) -> Self {
        match t {
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EndOfEarlyData => 5,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::Finished => 20,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::MessageHash => 254,
            HandshakeType::Unknown(v) => v,
        }
    }
}

/// `ContentType` — RFC 8446 §5.1. This enum is strictly bounded: an
/// unrecognised value is a decode error (`decode_error` alert), not a
/// GREASE opportunity, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

impl TryFrom<u8> for ContentType {
    type Error = CodecError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            20 => Ok(Self::ChangeCipherSpec),
            21 => Ok(Self::Alert),
            22 => Ok(Self::Handshake),
            23 => Ok(Self::ApplicationData),
            other => Err(CodecError::InvalidValue { field: "ContentType", value: other as u64 }),
        }
    }
}

impl From<ContentType> for u8 {
    fn from(t: ContentType) -> Self {
        match t {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
        }
    }
}

/// `CipherSuite` — RFC 8446 §B.4. Only the three mandatory-to-implement
/// AEAD suites are bound to concrete parameters by this crate; any other
/// value round-trips as `Unknown` so a ClientHello's full suite list can
/// still be parsed and re-emitted untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    Aes128GcmSha256,
    Aes256GcmSha384,
    Chacha20Poly1305Sha256,
    Unknown(u16),
}

impl From<u16> for CipherSuite {
    fn from(v: u16) -> Self {
        match v {
            0x1301 => Self::Aes128GcmSha256,
            0x1302 => Self::Aes256GcmSha384,
            0x1303 => Self::Chacha20Poly1305Sha256,
            other => Self::Unknown(other),
        }
    }
}

impl From<CipherSuite> for u16 {
    fn from(cs: CipherSuite) -> Self {
        match cs {
            CipherSuite::Aes128GcmSha256 => 0x1301,
            CipherSuite::Aes256GcmSha384 => 0x1302,
            CipherSuite::Chacha20Poly1305Sha256 => 0x1303,
            CipherSuite::Unknown(v) => v,
        }
    }
}

/// `NamedGroup` — RFC 8446 §4.2.7. `X25519` and `Secp256r1` are the two
/// groups this crate can actually perform a key exchange with; the others
/// are acknowledged (accepted in `supported_groups`, never selected) per
/// spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    X25519,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X448,
    Ffdhe2048,
    Ffdhe3072,
    Ffdhe4096,
    Ffdhe6144,
    Ffdhe8192,
    Unknown(u16),
}

impl NamedGroup {
    /// Whether this crate's key-exchange backend can actually use this
    /// group, as opposed to merely recognising it in a peer's list.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::X25519 | Self::Secp256r1)
    }
}

impl From<u16> for NamedGroup {
    fn from(v: u16) -> Self {
        match v {
            0x001d => Self::X25519,
            0x0017 => Self::Secp256r1,
            0x0018 => Self::Secp384r1,
            0x0019 => Self::Secp521r1,
            0x001e => Self::X448,
            0x0100 => Self::Ffdhe2048,
            0x0101 => Self::Ffdhe3072,
            0x0102 => Self::Ffdhe4096,
            0x0103 => Self::Ffdhe6144,
            0x0104 => Self::Ffdhe8192,
            other => Self::Unknown(other),
        }
    }
}

impl From<NamedGroup> for u16 {
    fn from(g: NamedGroup) -> Self {
        match g {
            NamedGroup::X25519 => 0x001d,
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::Secp521r1 => 0x0019,
            NamedGroup::X448 => 0x001e,
            NamedGroup::Ffdhe2048 => 0x0100,
            NamedGroup::Ffdhe3072 => 0x0101,
            NamedGroup::Ffdhe4096 => 0x0102,
            NamedGroup::Ffdhe6144 => 0x0103,
            NamedGroup::Ffdhe8192 => 0x0104,
            NamedGroup::Unknown(v) => v,
        }
    }
}

/// `SignatureScheme` — RFC 8446 §4.2.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    RsaPssRsaeSha256,
    RsaPssRsaeSha384,
    RsaPssRsaeSha512,
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    Ed25519,
    Unknown(u16),
}

impl From<u16> for SignatureScheme {
    fn from(v: u16) -> Self {
        match v {
            0x0804 => Self::RsaPssRsaeSha256,
            0x0805 => Self::RsaPssRsaeSha384,
            0x0806 => Self::RsaPssRsaeSha512,
            0x0403 => Self::EcdsaSecp256r1Sha256,
            0x0503 => Self::EcdsaSecp384r1Sha384,
            0x0807 => Self::Ed25519,
            other => Self::Unknown(other),
        }
    }
}

impl From<SignatureScheme> for u16 {
    fn from(s: SignatureScheme) -> Self {
        match s {
            SignatureScheme::RsaPssRsaeSha256 => 0x0804,
            SignatureScheme::RsaPssRsaeSha384 => 0x0805,
            SignatureScheme::RsaPssRsaeSha512 => 0x0806,
            SignatureScheme::EcdsaSecp256r1Sha256 => 0x0403,
            SignatureScheme::EcdsaSecp384r1Sha384 => 0x0503,
            SignatureScheme::Ed25519 => 0x0807,
            SignatureScheme::Unknown(v) => v,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_type_rejects_unknown_values() {
        assert_eq!(
            ContentType::try_from(99),
            Err(CodecError::InvalidValue { field: "ContentType", value: 99 })
        );
    }

    #[test]
    fn cipher_suite_round_trips_unknown_values_for_grease() {
        let grease: u16 = 0x0a0a;
        assert_eq!(CipherSuite::from(grease), CipherSuite::Unknown(grease));
        assert_eq!(u16::from(CipherSuite::from(grease)), grease);
    }

    #[test]
    fn named_group_supported_set_matches_spec() {
        assert!(NamedGroup::X25519.is_supported());
        assert!(NamedGroup::Secp256r1.is_supported());
        assert!(!NamedGroup::Secp384r1.is_supported());
    }
}
