//! The certificate provider interface the handshake calls through.
//! Loading DER from disk and validating a chain against a trust store
//! are both the caller's responsibility (PKI is explicitly out of
//! scope); this module only defines the seam the state machine calls
//! through.

use tls_wire::SignatureScheme;

use crate::error::Result;

/// A local identity: a certificate chain and a private key able to sign
/// under one `SignatureScheme`. The state machine calls `sign` exactly
/// once per handshake, over the `CertificateVerify` content built by
/// [`crate::connection::certificate_verify_content`].
pub trait CertificateProvider: Send + Sync {
    /// `cert_data` entries in wire order: leaf certificate first.
    fn chain_bytes(&self) -> &[Vec<u8>];
    fn signature_scheme(&self) -> SignatureScheme;
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Validates a peer's certificate chain. The state machine calls
/// `verify` at a fixed point — after the full `Certificate` message is
/// decoded and before `CertificateVerify` is checked against it.
pub trait CertificateVerifier: Send + Sync {
    fn verify(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<()>;

    /// The leaf certificate's subject public key, in the DER `SubjectPublicKeyInfo`
    /// form `ring::signature`'s `UnparsedPublicKey` expects — needed by the
    /// handshake layer to check `CertificateVerify` once the chain itself
    /// has validated. Out-of-scope ASN.1 parsing means implementors supply
    /// this however their PKI layer already extracts it.
    fn leaf_public_key(&self, chain: &[Vec<u8>]) -> Result<Vec<u8>>;
}

/// Accepts any chain without inspection. Exists only for tests and
/// interop debugging against a peer whose PKI validation is handled
/// elsewhere (or not at all) — never wire this into a production
/// configuration, hence the name. Assumes the "chain" it's handed is a
/// single raw `SubjectPublicKeyInfo`, as test fixtures do when they skip
/// certificate encoding entirely.
pub struct InsecureAcceptAnyCertificate;

impl CertificateVerifier for InsecureAcceptAnyCertificate {
    fn verify(&self, _chain: &[Vec<u8>], _server_name: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn leaf_public_key(&self, chain: &[Vec<u8>]) -> Result<Vec<u8>> {
        chain.first().cloned().ok_or(crate::error::HandshakeError::MissingExtension("certificate chain is empty"))
    }
}
