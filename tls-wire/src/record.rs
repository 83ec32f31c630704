//! Record-layer framing structures. This module is pure
//! wire shape: `TLSPlaintext`/`TLSCiphertext` header and length-prefixed
//! fragment. Fragmentation/reassembly across records, the ChangeCipherSpec
//! compatibility filter, AEAD sealing/opening, and nonce construction are
//! all behaviour that needs cryptographic state and so live one layer up,
//! in `tls-handshake::record`.

use crate::codec::{read_opaque, read_u16, read_u8, write_opaque, write_u16, write_u8, LengthPrefix, Reader};
use crate::error::{CodecError, Result};
use crate::handshake::LEGACY_VERSION;
use crate::types::ContentType;

/// The largest plaintext fragment a `TLSPlaintext` record may carry,
/// per RFC 8446 §5.1.
pub const MAX_PLAINTEXT_FRAGMENT_LEN: usize = 1 << 14;

/// The largest ciphertext fragment a `TLSCiphertext` record may carry
/// (plaintext limit plus room for the inner content-type byte and the
/// AEAD tag), per RFC 8446 §5.2.
pub const MAX_CIPHERTEXT_FRAGMENT_LEN: usize = (1 << 14) + 256;

/// A cleartext record: used before any keys are established, and for the
/// single tolerated `ChangeCipherSpec` compatibility byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPlaintext {
    pub content_type: ContentType,
    pub legacy_record_version: u16,
    pub fragment: Vec<u8>,
}

impl TlsPlaintext {
    #[must_use]
    pub fn new(content_type: ContentType, fragment: Vec<u8>) -> Self {
        Self { content_type, legacy_record_version: LEGACY_VERSION, fragment }
    }

    pub fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let content_type_byte = read_u8(c)?;
        let content_type = ContentType::try_from(content_type_byte)?;
        let legacy_record_version = read_u16(c)?;
        let fragment = read_opaque(c, LengthPrefix::U16)?;
        if fragment.len() > MAX_PLAINTEXT_FRAGMENT_LEN {
            return Err(CodecError::Overlong { stated_length: fragment.len(), available: MAX_PLAINTEXT_FRAGMENT_LEN });
        }
        Ok(Self { content_type, legacy_record_version, fragment })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.fragment.len() > MAX_PLAINTEXT_FRAGMENT_LEN {
            return Err(CodecError::EncodeShort { what: "TLSPlaintext fragment" });
        }
        write_u8(out, u8::from(self.content_type));
        write_u16(out, self.legacy_record_version);
        write_opaque(out, LengthPrefix::U16, &self.fragment)
    }

    /// The 5-byte record header, used as AEAD additional data once this
    /// record carries ciphertext.
    #[must_use]
    pub fn header_bytes(content_type: ContentType, legacy_record_version: u16, fragment_len: u16) -> [u8; 5] {
        let len = fragment_len.to_be_bytes();
        let ver = legacy_record_version.to_be_bytes();
        [u8::from(content_type), ver[0], ver[1], len[0], len[1]]
    }
}

/// An encrypted record. The wire-visible `content_type` is always
/// `ApplicationData`; the true type is the last byte of the decrypted
/// plaintext, recovered one layer up once the AEAD has been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCiphertext {
    pub legacy_record_version: u16,
    pub fragment: Vec<u8>,
}

impl TlsCiphertext {
    #[must_use]
    pub fn opaque_type() -> ContentType {
        ContentType::ApplicationData
    }

    #[must_use]
    pub fn new(fragment: Vec<u8>) -> Self {
        Self { legacy_record_version: LEGACY_VERSION, fragment }
    }

    pub fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let content_type_byte = read_u8(c)?;
        let content_type = ContentType::try_from(content_type_byte)?;
        if content_type != Self::opaque_type() {
            return Err(CodecError::InvalidValue { field: "TLSCiphertext.opaque_type", value: content_type_byte as u64 });
        }
        let legacy_record_version = read_u16(c)?;
        let fragment = read_opaque(c, LengthPrefix::U16)?;
        if fragment.len() > MAX_CIPHERTEXT_FRAGMENT_LEN {
            return Err(CodecError::Overlong { stated_length: fragment.len(), available: MAX_CIPHERTEXT_FRAGMENT_LEN });
        }
        Ok(Self { legacy_record_version, fragment })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.fragment.len() > MAX_CIPHERTEXT_FRAGMENT_LEN {
            return Err(CodecError::EncodeShort { what: "TLSCiphertext fragment" });
        }
        write_u8(out, u8::from(Self::opaque_type()));
        write_u16(out, self.legacy_record_version);
        write_opaque(out, LengthPrefix::U16, &self.fragment)
    }

    /// The additional authenticated data for this ciphertext record: the
    /// 5-byte header as it appears on the wire.
    #[must_use]
    pub fn additional_data(&self) -> [u8; 5] {
        TlsPlaintext::header_bytes(Self::opaque_type(), self.legacy_record_version, self.fragment.len() as u16)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plaintext_round_trips() {
        let record = TlsPlaintext::new(ContentType::Handshake, vec![1, 2, 3, 4]);
        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        assert_eq!(TlsPlaintext::read_from(&mut Reader::new(&buf)).unwrap(), record);
    }

    #[test]
    fn plaintext_rejects_oversized_fragment() {
        let record = TlsPlaintext::new(ContentType::ApplicationData, vec![0; MAX_PLAINTEXT_FRAGMENT_LEN + 1]);
        let mut buf = Vec::new();
        assert!(record.write_to(&mut buf).is_err());
    }

    #[test]
    fn ciphertext_round_trips_and_computes_aad() {
        let record = TlsCiphertext::new(vec![0xaa; 32]);
        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        let decoded = TlsCiphertext::read_from(&mut Reader::new(&buf)).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.additional_data(), [0x17, 0x03, 0x03, 0x00, 0x20]);
    }

    #[test]
    fn ciphertext_rejects_non_application_data_opaque_type() {
        let mut buf = Vec::new();
        write_u8(&mut buf, u8::from(ContentType::Handshake));
        write_u16(&mut buf, LEGACY_VERSION);
        write_opaque(&mut buf, LengthPrefix::U16, &[1, 2, 3]).unwrap();
        assert!(TlsCiphertext::read_from(&mut Reader::new(&buf)).is_err());
    }
}
