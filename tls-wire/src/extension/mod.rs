//! The extension codec: a tagged union over [`ExtensionType`], dispatched
//! by type on decode. Each variant owns its own encode/decode/length
//! behaviour, following the same closed-tagged-union shape as
//! `dns::record::Record` rather than a virtual-dispatch hierarchy.
//!
//! An extension whose type is unknown, or whose handshake context permits
//! ignoring it, decodes to [`Extension::Unknown`] with its opaque body
//! preserved for inspection. Per spec, `Unknown` extensions are never
//! re-encoded — they exist only so a caller can see what a peer sent.

mod alpn;
mod cookie;
mod early_data;
mod key_share;
mod pre_shared_key;
mod psk_key_exchange_modes;
mod quic_transport_parameters;
mod record_size_limit;
mod server_name;
mod signature_algorithms;
mod supported_groups;
mod supported_versions;

pub use alpn::AlpnProtocols;
pub use cookie::Cookie;
pub use early_data::EarlyDataIndication;
pub use key_share::{KeyShareClientHello, KeyShareEntry, KeyShareHelloRetryRequest, KeyShareServerHello};
pub use pre_shared_key::{PreSharedKeyClientHello, PreSharedKeyServerHello, PskIdentity};
pub use psk_key_exchange_modes::{PskKeyExchangeMode, PskKeyExchangeModes};
pub use quic_transport_parameters::QuicTransportParametersExt;
pub use record_size_limit::RecordSizeLimit;
pub use server_name::ServerNameList;
pub use signature_algorithms::SignatureSchemeList;
pub use supported_groups::SupportedGroupList;
pub use supported_versions::SupportedVersions;

use crate::codec::{read_opaque, read_u16, write_opaque, write_u16, LengthPrefix, Reader};
use crate::error::{CodecError, Result};

/// Which handshake message an extension is being read from or written
/// into. Several extensions (`key_share`, `supported_versions`,
/// `pre_shared_key`) are polymorphic in shape depending on this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionContext {
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    EncryptedExtensions,
    CertificateRequest,
    Certificate,
    NewSessionTicket,
}

/// `ExtensionType` — the union of every codepoint this crate dispatches
/// on, plus `Unknown` for everything else. RFC 8446 §4.2, RFC 8449
/// (record_size_limit), RFC 9001 §8.2 (quic_transport_parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    SignatureAlgorithms,
    ApplicationLayerProtocolNegotiation,
    RecordSizeLimit,
    PreSharedKey,
    EarlyData,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    SignatureAlgorithmsCert,
    KeyShare,
    QuicTransportParameters,
    Unknown(u16),
}

impl From<u16> for ExtensionType {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::ServerName,
            10 => Self::SupportedGroups,
            13 => Self::SignatureAlgorithms,
            16 => Self::ApplicationLayerProtocolNegotiation,
            28 => Self::RecordSizeLimit,
            41 => Self::PreSharedKey,
            42 => Self::EarlyData,
            43 => Self::SupportedVersions,
            44 => Self::Cookie,
            45 => Self::PskKeyExchangeModes,
            50 => Self::SignatureAlgorithmsCert,
            51 => Self::KeyShare,
            57 => Self::QuicTransportParameters,
            other => Self::Unknown(other),
        }
    }
}

impl From<ExtensionType> for u16 {
    fn from(t: ExtensionType) -> Self {
        match t {
            ExtensionType::ServerName => 0,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::ApplicationLayerProtocolNegotiation => 16,
            ExtensionType::RecordSizeLimit => 28,
            ExtensionType::PreSharedKey => 41,
            ExtensionType::EarlyData => 42,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::Cookie => 44,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::SignatureAlgorithmsCert => 50,
            ExtensionType::KeyShare => 51,
            ExtensionType::QuicTransportParameters => 57,
            ExtensionType::Unknown(v) => v,
        }
    }
}

/// A single decoded extension.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    ServerName(ServerNameList),
    SupportedGroups(SupportedGroupList),
    SignatureAlgorithms(SignatureSchemeList),
    SignatureAlgorithmsCert(SignatureSchemeList),
    Alpn(AlpnProtocols),
    RecordSizeLimit(RecordSizeLimit),
    PreSharedKeyClientHello(PreSharedKeyClientHello),
    PreSharedKeyServerHello(PreSharedKeyServerHello),
    EarlyData(EarlyDataIndication),
    SupportedVersionsClientHello(Vec<u16>),
    SupportedVersionsServerHello(u16),
    Cookie(Cookie),
    PskKeyExchangeModes(PskKeyExchangeModes),
    KeyShareClientHello(KeyShareClientHello),
    KeyShareServerHello(KeyShareServerHello),
    KeyShareHelloRetryRequest(KeyShareHelloRetryRequest),
    QuicTransportParameters(QuicTransportParametersExt),

    /// An extension this crate recognised the type of, but whose context
    /// makes it non-fatal to skip (or whose body didn't parse and RFC 8446
    /// permits ignoring it) — retained for inspection, never re-emitted.
    Unknown { extension_type: ExtensionType, body: Vec<u8> },
}

impl Extension {
    #[must_use]
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Self::ServerName(_) => ExtensionType::ServerName,
            Self::SupportedGroups(_) => ExtensionType::SupportedGroups,
            Self::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Self::SignatureAlgorithmsCert(_) => ExtensionType::SignatureAlgorithmsCert,
            Self::Alpn(_) => ExtensionType::ApplicationLayerProtocolNegotiation,
            Self::RecordSizeLimit(_) => ExtensionType::RecordSizeLimit,
            Self::PreSharedKeyClientHello(_) | Self::PreSharedKeyServerHello(_) => ExtensionType::PreSharedKey,
            Self::EarlyData(_) => ExtensionType::EarlyData,
            Self::SupportedVersionsClientHello(_) | Self::SupportedVersionsServerHello(_) => ExtensionType::SupportedVersions,
            Self::Cookie(_) => ExtensionType::Cookie,
            Self::PskKeyExchangeModes(_) => ExtensionType::PskKeyExchangeModes,
            Self::KeyShareClientHello(_) | Self::KeyShareServerHello(_) | Self::KeyShareHelloRetryRequest(_) => ExtensionType::KeyShare,
            Self::QuicTransportParameters(_) => ExtensionType::QuicTransportParameters,
            Self::Unknown { extension_type, .. } => *extension_type,
        }
    }

    /// Decodes a single extension (2-byte type, 2-byte length, body) from
    /// the cursor, dispatching on `extension_type` within `context`.
    ///
    /// Decode errors inside an extension are only fatal to the whole
    /// message when RFC 8446 requires it (currently: a malformed
    /// `key_share`). Everything else degrades to `Unknown` so one bad
    /// extension can't poison the rest of the message.
    pub fn read_from(c: &mut Reader<'_>, context: ExtensionContext) -> Result<Self> {
        let extension_type = ExtensionType::from(read_u16(c)?);
        let body = read_opaque(c, LengthPrefix::U16)?;
        let mut body_cursor = Reader::new(&body);

        let parsed = match (extension_type, context) {
            (ExtensionType::ServerName, _) => ServerNameList::read_from(&mut body_cursor).map(Self::ServerName),
            (ExtensionType::SupportedGroups, _) => SupportedGroupList::read_from(&mut body_cursor).map(Self::SupportedGroups),
            (ExtensionType::SignatureAlgorithms, _) => SignatureSchemeList::read_from(&mut body_cursor).map(Self::SignatureAlgorithms),
            (ExtensionType::SignatureAlgorithmsCert, _) => SignatureSchemeList::read_from(&mut body_cursor).map(Self::SignatureAlgorithmsCert),
            (ExtensionType::ApplicationLayerProtocolNegotiation, _) => AlpnProtocols::read_from(&mut body_cursor, context).map(Self::Alpn),
            (ExtensionType::RecordSizeLimit, _) => RecordSizeLimit::read_from(&mut body_cursor).map(Self::RecordSizeLimit),
            (ExtensionType::EarlyData, _) => EarlyDataIndication::read_from(&mut body_cursor, context).map(Self::EarlyData),
            (ExtensionType::Cookie, _) => Cookie::read_from(&mut body_cursor).map(Self::Cookie),
            (ExtensionType::PskKeyExchangeModes, ExtensionContext::ClientHello) => {
                PskKeyExchangeModes::read_from(&mut body_cursor).map(Self::PskKeyExchangeModes)
            }
            (ExtensionType::SupportedVersions, ExtensionContext::ClientHello) => {
                supported_versions::read_client_hello(&mut body_cursor).map(Self::SupportedVersionsClientHello)
            }
            (ExtensionType::SupportedVersions, ExtensionContext::ServerHello | ExtensionContext::HelloRetryRequest) => {
                supported_versions::read_server_hello(&mut body_cursor).map(Self::SupportedVersionsServerHello)
            }
            (ExtensionType::PreSharedKey, ExtensionContext::ClientHello) => {
                PreSharedKeyClientHello::read_from(&mut body_cursor).map(Self::PreSharedKeyClientHello)
            }
            (ExtensionType::PreSharedKey, ExtensionContext::ServerHello) => {
                PreSharedKeyServerHello::read_from(&mut body_cursor).map(Self::PreSharedKeyServerHello)
            }
            (ExtensionType::KeyShare, ExtensionContext::ClientHello) => {
                // Malformed key_share is fatal per RFC 8446 §4.2.8: propagate
                // the error instead of degrading to Unknown.
                return KeyShareClientHello::read_from(&mut body_cursor).map(Self::KeyShareClientHello);
            }
            (ExtensionType::KeyShare, ExtensionContext::ServerHello) => {
                return KeyShareEntry::read_from(&mut body_cursor).map(KeyShareServerHello).map(Self::KeyShareServerHello);
            }
            (ExtensionType::KeyShare, ExtensionContext::HelloRetryRequest) => {
                return read_u16(&mut body_cursor)
                    .map(|g| Self::KeyShareHelloRetryRequest(KeyShareHelloRetryRequest(g.into())));
            }
            (ExtensionType::QuicTransportParameters, _) => {
                QuicTransportParametersExt::read_from(&mut body_cursor).map(Self::QuicTransportParameters)
            }
            _ => Err(CodecError::InvalidValue { field: "ExtensionType", value: u16::from(extension_type) as u64 }),
        };

        Ok(parsed.unwrap_or(Self::Unknown { extension_type, body }))
    }

    /// Encodes this extension. Returns `Ok(None)` for `Unknown` extensions,
    /// which are never re-emitted.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if matches!(self, Self::Unknown { .. }) {
            return Err(CodecError::EncodeShort { what: "an `unknown` extension (inspection-only, not re-emittable)" });
        }

        write_u16(out, u16::from(self.extension_type()));
        let mut body = Vec::new();
        match self {
            Self::ServerName(v) => v.write_to(&mut body),
            Self::SupportedGroups(v) => v.write_to(&mut body),
            Self::SignatureAlgorithms(v) | Self::SignatureAlgorithmsCert(v) => v.write_to(&mut body),
            Self::Alpn(v) => v.write_to(&mut body),
            Self::RecordSizeLimit(v) => v.write_to(&mut body),
            Self::EarlyData(_) => {}
            Self::Cookie(v) => v.write_to(&mut body),
            Self::PskKeyExchangeModes(v) => v.write_to(&mut body),
            Self::SupportedVersionsClientHello(versions) => supported_versions::write_client_hello(&mut body, versions),
            Self::SupportedVersionsServerHello(v) => write_u16(&mut body, *v),
            Self::PreSharedKeyClientHello(v) => v.write_to(&mut body),
            Self::PreSharedKeyServerHello(v) => v.write_to(&mut body),
            Self::KeyShareClientHello(v) => v.write_to(&mut body),
            Self::KeyShareServerHello(v) => v.0.write_to(&mut body),
            Self::KeyShareHelloRetryRequest(v) => write_u16(&mut body, u16::from(v.0)),
            Self::QuicTransportParameters(v) => v.write_to(&mut body),
            Self::Unknown { .. } => unreachable!("checked above"),
        }
        write_opaque(out, LengthPrefix::U16, &body)?;
        Ok(())
    }

    #[must_use]
    pub fn length(&self) -> usize {
        let mut body = Vec::new();
        // cheap but correct: every variant's write is pure and
        // side-effect-free, so reusing it to measure length keeps the
        // length()-equals-encode()-length invariant trivially true.
        let mut scratch = Vec::new();
        if self.write_to(&mut scratch).is_ok() {
            body.extend_from_slice(&scratch);
            return body.len();
        }
        0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_extension_is_never_reencoded() {
        let ext = Extension::Unknown { extension_type: ExtensionType::Unknown(0xaaaa), body: vec![1, 2, 3] };
        let mut out = Vec::new();
        assert!(ext.write_to(&mut out).is_err());
    }

    #[test]
    fn unrecognised_type_degrades_to_unknown_without_poisoning_decode() {
        let mut body = Vec::new();
        write_u16(&mut body, 0xfafa); // GREASE-ish type
        write_opaque(&mut body, LengthPrefix::U16, &[9, 9, 9]).unwrap();

        let mut c = Reader::new(&body);
        let ext = Extension::read_from(&mut c, ExtensionContext::ClientHello).unwrap();
        assert_eq!(ext, Extension::Unknown { extension_type: ExtensionType::Unknown(0xfafa), body: vec![9, 9, 9] });
    }

    #[test]
    fn length_matches_encode_output() {
        let ext = Extension::SupportedVersionsServerHello(0x0304);
        let mut out = Vec::new();
        ext.write_to(&mut out).unwrap();
        assert_eq!(out.len(), ext.length());
    }
}
