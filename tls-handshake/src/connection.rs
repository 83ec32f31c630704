//! Shared connection-state scaffolding used by both
//! [`crate::client::ClientConnection`] and [`crate::server::ServerConnection`]:
//! the role/epoch vocabulary, negotiated-parameter storage,
//! and the `CertificateVerify` signature-content builder (RFC 8446 §4.4.3).

use tls_crypto::provider::{Csprng, Hkdf, KeyExchange, Verifier};
use tls_crypto::CryptoError;
use tls_wire::{CipherSuite, NamedGroup, SignatureScheme};

/// The raw cryptographic-primitive collaborators both state machines are
/// written against, minus `Signer` and
/// `Aead`/`Hash`/`Hkdf` which are looked up per cipher suite via
/// `tls_crypto::params_for` instead of threaded through explicitly.
pub struct CryptoProviders<'a> {
    pub rng: &'a dyn Csprng,
    pub key_exchange: &'a dyn KeyExchange,
    pub signature_verifier: &'a dyn Verifier,
}

/// Which side of the handshake a connection is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The four traffic-key epochs. `UpdatedApplication`
/// counts how many `KeyUpdate`s have ratcheted the traffic secret forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Epoch {
    EarlyData,
    Handshake,
    Application,
    UpdatedApplication(u64),
}

/// The negotiated parameters of a completed (or completing) handshake.
#[derive(Debug, Clone)]
pub struct NegotiatedParams {
    pub cipher_suite: CipherSuite,
    pub group: NamedGroup,
    pub signature_scheme: Option<SignatureScheme>,
    pub alpn: Option<Vec<u8>>,
    pub server_name: Option<String>,
}

/// RFC 8446 §4.4.3: the content a `CertificateVerify` signature actually
/// covers is never the bare transcript hash — it's 64 spaces, a
/// role-specific context string, a zero byte, then the hash. This
/// construction is what defeats cross-protocol signature confusion
/// attacks between TLS 1.3 and older versions/contexts.
pub fn certificate_verify_content(context_string: &[u8], transcript_hash: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(64 + context_string.len() + 1 + transcript_hash.len());
    content.extend(std::iter::repeat(0x20).take(64));
    content.extend_from_slice(context_string);
    content.push(0);
    content.extend_from_slice(transcript_hash);
    content
}

pub const SERVER_CERTIFICATE_VERIFY_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
pub const CLIENT_CERTIFICATE_VERIFY_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

/// Constant-time-ish comparison for `Finished` verify_data and PSK binders:
/// both are HMAC outputs, so a mismatch is a `FinishedMismatch`/crypto
/// failure rather than a decode error either way, but we still don't want
/// a short-circuiting `==` on secret-derived bytes.
#[must_use]
pub fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    ring_fixed_time_eq(a, b)
}

fn ring_fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0_u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub(crate) fn map_crypto(err: CryptoError) -> crate::error::HandshakeError {
    crate::error::HandshakeError::from(err)
}

/// `Box<dyn Hkdf>` can't be cloned directly; every `Hkdf` this crate ships
/// is stateless, so re-resolving one bound to the same hash via its output
/// length is equivalent to cloning it. Shared by the client and server
/// state machines, which both need a second owned `Hkdf` handle (one for a
/// scratch [`tls_crypto::KeySchedule`], one still borrowed from the live
/// `CipherSuiteParams`) without giving up the original.
pub(crate) fn clone_hkdf(hkdf: &dyn Hkdf) -> Box<dyn Hkdf> {
    match hkdf.hash().output_len() {
        48 => tls_crypto::params_for(CipherSuite::Aes256GcmSha384).expect("suite is always supported").hkdf,
        _ => tls_crypto::params_for(CipherSuite::Aes128GcmSha256).expect("suite is always supported").hkdf,
    }
}
