//! The handshake message codec: the 1-byte type + 3-byte length header
//! shared by every handshake message, and the per-type body shapes RFC
//! 8446 §4 names.

use crate::codec::{read_opaque, read_u16, read_u24, read_u32, read_u8, write_opaque, write_u16, write_u24, write_u32, write_u8, LengthPrefix, Reader};
use crate::error::{CodecError, Result};
use crate::extension::{Extension, ExtensionContext};
use crate::types::{CipherSuite, HandshakeType, SignatureScheme};

/// RFC 8446 §4.1.3: a ServerHello whose `random` equals this value is
/// actually a HelloRetryRequest.
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11,
    0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E,
    0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

/// `legacy_version` as it appears on the wire in ClientHello/ServerHello,
/// frozen at TLS 1.2's value for middlebox compatibility (RFC 8446 §4.1.2).
pub const LEGACY_VERSION: u16 = 0x0303;

fn read_body(c: &mut Reader<'_>, len: u32) -> Result<Vec<u8>> {
    let len = len as usize;
    let available = c.get_ref().len().saturating_sub(c.position() as usize);
    if len > available {
        return Err(CodecError::Overlong { stated_length: len, available });
    }
    let mut buf = vec![0_u8; len];
    std::io::Read::read_exact(c, &mut buf)?;
    Ok(buf)
}

fn read_extension_list(c: &mut Reader<'_>, context: ExtensionContext) -> Result<Vec<Extension>> {
    let bytes = read_opaque(c, LengthPrefix::U16)?;
    let mut inner = Reader::new(&bytes);
    let mut extensions = Vec::new();
    while (inner.position() as usize) < bytes.len() {
        extensions.push(Extension::read_from(&mut inner, context)?);
    }
    Ok(extensions)
}

fn write_extension_list(out: &mut Vec<u8>, extensions: &[Extension]) -> Result<()> {
    let mut body = Vec::new();
    for ext in extensions {
        // `Unknown` extensions are never re-emitted; silently drop them
        // here rather than at every call site.
        if ext.write_to(&mut body).is_err() {
            continue;
        }
    }
    write_opaque(out, LengthPrefix::U16, &body)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub legacy_session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let legacy_version = read_u16(c)?;
        let mut random = [0_u8; 32];
        std::io::Read::read_exact(c, &mut random)?;
        let legacy_session_id = read_opaque(c, LengthPrefix::U8)?;

        let suites_bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut suites_cursor = Reader::new(&suites_bytes);
        let mut cipher_suites = Vec::new();
        while (suites_cursor.position() as usize) < suites_bytes.len() {
            cipher_suites.push(CipherSuite::from(read_u16(&mut suites_cursor)?));
        }

        let compression_methods = read_opaque(c, LengthPrefix::U8)?;
        if compression_methods != [0x00] {
            return Err(CodecError::InvalidValue { field: "legacy_compression_methods", value: compression_methods.len() as u64 });
        }

        let extensions = read_extension_list(c, ExtensionContext::ClientHello)?;

        Ok(Self { legacy_version, random, legacy_session_id, cipher_suites, extensions })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.legacy_version);
        out.extend_from_slice(&self.random);
        write_opaque(out, LengthPrefix::U8, &self.legacy_session_id)?;

        let mut suites = Vec::new();
        for suite in &self.cipher_suites {
            write_u16(&mut suites, u16::from(*suite));
        }
        write_opaque(out, LengthPrefix::U16, &suites)?;

        write_opaque(out, LengthPrefix::U8, &[0x00])?;
        write_extension_list(out, &self.extensions)?;
        Ok(())
    }

    /// Finds the byte offset, from the start of the encoded body, at which
    /// the tail of the `pre_shared_key` extension's binders list begins —
    /// used by the handshake layer to patch real binder HMACs in after
    /// computing the transcript hash over everything before them.
    #[must_use]
    pub fn psk_binders_offset(&self) -> Option<usize> {
        let binders_len = self.extensions.iter().find_map(|ext| match ext {
            Extension::PreSharedKeyClientHello(psk) => Some(psk.binders_section_len()),
            _ => None,
        })?;
        let mut encoded = Vec::new();
        self.write_to(&mut encoded).ok()?;
        Some(encoded.len() - binders_len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub legacy_session_id_echo: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    #[must_use]
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    fn read_from(c: &mut Reader<'_>, context: ExtensionContext) -> Result<Self> {
        let legacy_version = read_u16(c)?;
        let mut random = [0_u8; 32];
        std::io::Read::read_exact(c, &mut random)?;
        let legacy_session_id_echo = read_opaque(c, LengthPrefix::U8)?;
        let cipher_suite = CipherSuite::from(read_u16(c)?);

        let legacy_compression_method = read_u8(c)?;
        if legacy_compression_method != 0x00 {
            return Err(CodecError::InvalidValue { field: "legacy_compression_method", value: legacy_compression_method as u64 });
        }

        let extensions = read_extension_list(c, context)?;
        Ok(Self { legacy_version, random, legacy_session_id_echo, cipher_suite, extensions })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.legacy_version);
        out.extend_from_slice(&self.random);
        write_opaque(out, LengthPrefix::U8, &self.legacy_session_id_echo)?;
        write_u16(out, u16::from(self.cipher_suite));
        write_u8(out, 0x00);
        write_extension_list(out, &self.extensions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

impl EncryptedExtensions {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        Ok(Self { extensions: read_extension_list(c, ExtensionContext::EncryptedExtensions)? })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_extension_list(out, &self.extensions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRequest {
    pub certificate_request_context: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl CertificateRequest {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let certificate_request_context = read_opaque(c, LengthPrefix::U8)?;
        let extensions = read_extension_list(c, ExtensionContext::CertificateRequest)?;
        Ok(Self { certificate_request_context, extensions })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_opaque(out, LengthPrefix::U8, &self.certificate_request_context)?;
        write_extension_list(out, &self.extensions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateEntry {
    pub cert_data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub certificate_request_context: Vec<u8>,
    pub entries: Vec<CertificateEntry>,
}

impl Certificate {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let certificate_request_context = read_opaque(c, LengthPrefix::U8)?;
        let list_bytes = read_opaque(c, LengthPrefix::U24)?;
        let mut list_cursor = Reader::new(&list_bytes);
        let mut entries = Vec::new();
        while (list_cursor.position() as usize) < list_bytes.len() {
            let cert_data = read_opaque(&mut list_cursor, LengthPrefix::U24)?;
            let extensions = read_extension_list(&mut list_cursor, ExtensionContext::Certificate)?;
            entries.push(CertificateEntry { cert_data, extensions });
        }
        Ok(Self { certificate_request_context, entries })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_opaque(out, LengthPrefix::U8, &self.certificate_request_context)?;
        let mut list = Vec::new();
        for entry in &self.entries {
            write_opaque(&mut list, LengthPrefix::U24, &entry.cert_data)?;
            write_extension_list(&mut list, &entry.extensions)?;
        }
        write_opaque(out, LengthPrefix::U24, &list)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateVerify {
    pub algorithm: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let algorithm = SignatureScheme::from(read_u16(c)?);
        let signature = read_opaque(c, LengthPrefix::U16)?;
        Ok(Self { algorithm, signature })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, u16::from(self.algorithm));
        write_opaque(out, LengthPrefix::U16, &self.signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    fn read_from(c: &mut Reader<'_>, expected_len: usize) -> Result<Self> {
        let verify_data = read_body(c, expected_len as u32)?;
        Ok(Self { verify_data })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.verify_data);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl NewSessionTicket {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let ticket_lifetime = read_u32(c)?;
        let ticket_age_add = read_u32(c)?;
        let ticket_nonce = read_opaque(c, LengthPrefix::U8)?;
        let ticket = read_opaque(c, LengthPrefix::U16)?;
        let extensions = read_extension_list(c, ExtensionContext::NewSessionTicket)?;
        Ok(Self { ticket_lifetime, ticket_age_add, ticket_nonce, ticket, extensions })
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.ticket_lifetime);
        write_u32(out, self.ticket_age_add);
        write_opaque(out, LengthPrefix::U8, &self.ticket_nonce)?;
        write_opaque(out, LengthPrefix::U16, &self.ticket)?;
        write_extension_list(out, &self.extensions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdateRequest {
    UpdateNotRequested,
    UpdateRequested,
    Unknown(u8),
}

impl From<u8> for KeyUpdateRequest {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::UpdateNotRequested,
            1 => Self::UpdateRequested,
            other => Self::Unknown(other),
        }
    }
}

impl From<KeyUpdateRequest> for u8 {
    fn from(r: KeyUpdateRequest) -> Self {
        match r {
            KeyUpdateRequest::UpdateNotRequested => 0,
            KeyUpdateRequest::UpdateRequested => 1,
            KeyUpdateRequest::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    pub request_update: KeyUpdateRequest,
}

/// A single decoded handshake message, tagged by type.
///
/// `HelloRetryRequest` is split out from `ServerHello` even though they
/// share a wire shape, since `random` is the only thing distinguishing
/// them and every call site needs to branch on it anyway.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    HelloRetryRequest(ServerHello),
    NewSessionTicket(NewSessionTicket),
    EndOfEarlyData,
    EncryptedExtensions(EncryptedExtensions),
    CertificateRequest(CertificateRequest),
    Certificate(Certificate),
    CertificateVerify(CertificateVerify),
    Finished(Finished),
    KeyUpdate(KeyUpdate),
}

impl HandshakeMessage {
    #[must_use]
    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            Self::ClientHello(_) => HandshakeType::ClientHello,
            Self::ServerHello(_) | Self::HelloRetryRequest(_) => HandshakeType::ServerHello,
            Self::NewSessionTicket(_) => HandshakeType::NewSessionTicket,
            Self::EndOfEarlyData => HandshakeType::EndOfEarlyData,
            Self::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            Self::CertificateRequest(_) => HandshakeType::CertificateRequest,
            Self::Certificate(_) => HandshakeType::Certificate,
            Self::CertificateVerify(_) => HandshakeType::CertificateVerify,
            Self::Finished(_) => HandshakeType::Finished,
            Self::KeyUpdate(_) => HandshakeType::KeyUpdate,
        }
    }

    /// Decodes one handshake message from its 1-byte type + 3-byte length
    /// header and body. `finished_len` is the HMAC output size of the
    /// negotiated hash — required to know where a `Finished` message ends,
    /// since that message carries no internal length field of its own
    /// beyond the outer header.
    pub fn read_from(c: &mut Reader<'_>, finished_len: usize) -> Result<Self> {
        let ty = HandshakeType::from(read_u8(c)?);
        let len = read_u24(c)?;
        let body = read_body(c, len)?;
        let mut bc = Reader::new(&body);

        Ok(match ty {
            HandshakeType::ClientHello => Self::ClientHello(ClientHello::read_from(&mut bc)?),
            HandshakeType::ServerHello => {
                let sh = ServerHello::read_from(&mut bc, ExtensionContext::ServerHello)?;
                if sh.is_hello_retry_request() {
                    Self::HelloRetryRequest(ServerHello::read_from(&mut Reader::new(&body), ExtensionContext::HelloRetryRequest)?)
                } else {
                    Self::ServerHello(sh)
                }
            }
            HandshakeType::NewSessionTicket => Self::NewSessionTicket(NewSessionTicket::read_from(&mut bc)?),
            HandshakeType::EndOfEarlyData => Self::EndOfEarlyData,
            HandshakeType::EncryptedExtensions => Self::EncryptedExtensions(EncryptedExtensions::read_from(&mut bc)?),
            HandshakeType::CertificateRequest => Self::CertificateRequest(CertificateRequest::read_from(&mut bc)?),
            HandshakeType::Certificate => Self::Certificate(Certificate::read_from(&mut bc)?),
            HandshakeType::CertificateVerify => Self::CertificateVerify(CertificateVerify::read_from(&mut bc)?),
            HandshakeType::Finished => Self::Finished(Finished::read_from(&mut bc, finished_len)?),
            HandshakeType::KeyUpdate => Self::KeyUpdate(KeyUpdate { request_update: KeyUpdateRequest::from(read_u8(&mut bc)?) }),
            HandshakeType::MessageHash | HandshakeType::Unknown(_) => {
                return Err(CodecError::InvalidValue { field: "HandshakeType", value: u8::from(ty) as u64 });
            }
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u8(out, u8::from(self.handshake_type()));
        let mut body = Vec::new();
        match self {
            Self::ClientHello(m) => m.write_to(&mut body)?,
            Self::ServerHello(m) | Self::HelloRetryRequest(m) => m.write_to(&mut body)?,
            Self::NewSessionTicket(m) => m.write_to(&mut body)?,
            Self::EndOfEarlyData => {}
            Self::EncryptedExtensions(m) => m.write_to(&mut body)?,
            Self::CertificateRequest(m) => m.write_to(&mut body)?,
            Self::Certificate(m) => m.write_to(&mut body)?,
            Self::CertificateVerify(m) => m.write_to(&mut body)?,
            Self::Finished(m) => m.write_to(&mut body),
            Self::KeyUpdate(m) => write_u8(&mut body, u8::from(m.request_update)),
        }
        write_u24(out, body.len() as u32);
        out.extend_from_slice(&body);
        Ok(())
    }

    #[must_use]
    pub fn length(&self) -> usize {
        let mut out = Vec::new();
        self.write_to(&mut out).map(|()| out.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extension::SupportedGroupList;
    use crate::types::NamedGroup;
    use pretty_assertions::assert_eq;

    fn sample_client_hello() -> ClientHello {
        ClientHello {
            legacy_version: LEGACY_VERSION,
            random: [7_u8; 32],
            legacy_session_id: vec![1, 2, 3],
            cipher_suites: vec![CipherSuite::Aes128GcmSha256, CipherSuite::Chacha20Poly1305Sha256],
            extensions: vec![Extension::SupportedGroups(SupportedGroupList { groups: vec![NamedGroup::X25519] })],
        }
    }

    #[test]
    fn client_hello_round_trips_and_length_matches() {
        let msg = HandshakeMessage::ClientHello(sample_client_hello());
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.length());
        assert_eq!(HandshakeMessage::read_from(&mut Reader::new(&buf), 32).unwrap(), msg);
    }

    #[test]
    fn client_hello_rejects_nonzero_compression_methods() {
        let ch = sample_client_hello();
        let mut body = Vec::new();
        ch.write_to(&mut body).unwrap();

        // Locate and corrupt the single compression-method byte: it's the
        // byte right after the 1-byte compression-methods length (which is
        // itself right after the 2-byte-prefixed cipher-suite list).
        let suites_offset = 2 + 32 + (1 + ch.legacy_session_id.len());
        let suites_len = u16::from_be_bytes([body[suites_offset], body[suites_offset + 1]]) as usize;
        let compression_value_offset = suites_offset + 2 + suites_len + 1;
        assert_eq!(body[compression_value_offset], 0x00);
        body[compression_value_offset] = 0x01;

        let mut full = Vec::new();
        write_u8(&mut full, u8::from(HandshakeType::ClientHello));
        write_u24(&mut full, body.len() as u32);
        full.extend_from_slice(&body);

        assert!(matches!(
            HandshakeMessage::read_from(&mut Reader::new(&full), 32),
            Err(CodecError::InvalidValue { field: "legacy_compression_methods", .. })
        ));
    }

    #[test]
    fn hello_retry_request_is_distinguished_from_server_hello_by_random() {
        let sh = ServerHello {
            legacy_version: LEGACY_VERSION,
            random: HELLO_RETRY_REQUEST_RANDOM,
            legacy_session_id_echo: vec![],
            cipher_suite: CipherSuite::Aes128GcmSha256,
            extensions: vec![Extension::SupportedVersionsServerHello(0x0304)],
        };
        let msg = HandshakeMessage::ServerHello(sh);
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert!(matches!(HandshakeMessage::read_from(&mut Reader::new(&buf), 32).unwrap(), HandshakeMessage::HelloRetryRequest(_)));
    }

    #[test]
    fn finished_reads_exactly_the_hash_output_size() {
        let finished = HandshakeMessage::Finished(Finished { verify_data: vec![9; 48] });
        let mut buf = Vec::new();
        finished.write_to(&mut buf).unwrap();
        assert_eq!(HandshakeMessage::read_from(&mut Reader::new(&buf), 48).unwrap(), finished);
    }
}
