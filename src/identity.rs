//! Loading a certificate chain and private key from disk, handing raw
//! bytes to the protocol core. X.509 parsing and PKI chain validation
//! stay out of scope — this module only gets bytes off disk and into the
//! shapes `tls-handshake::cert` wants.

use std::fs::File;
use std::io::{self, BufReader};

use tls_crypto::SigningKey;
use tls_handshake::cert::{CertificateProvider, CertificateVerifier};
use tls_handshake::error::{HandshakeError, Result};
use tls_wire::SignatureScheme;

/// A loaded identity: a leaf-first DER certificate chain plus a private
/// key able to sign under exactly one [`SignatureScheme`].
pub struct LoadedIdentity {
    chain: Vec<Vec<u8>>,
    key: SigningKey,
    scheme: SignatureScheme,
}

impl LoadedIdentity {
    /// Reads a PEM certificate chain and a PEM PKCS#8 private key. The key
    /// type is detected by trying each signature scheme this crate's
    /// `ring` backend supports, in the order a TLS 1.3 deployment is most
    /// likely to use: ECDSA P-256, then Ed25519, then RSA-PSS.
    pub fn load(cert_path: &str, key_path: &str) -> Result<Self> {
        let chain = read_pem_certs(cert_path)?;
        let pkcs8 = read_pem_pkcs8_key(key_path)?;

        let (key, scheme) = SigningKey::from_pkcs8_ecdsa_p256(&pkcs8)
            .map(|k| (k, SignatureScheme::EcdsaSecp256r1Sha256))
            .or_else(|_| SigningKey::from_pkcs8_ed25519(&pkcs8).map(|k| (k, SignatureScheme::Ed25519)))
            .or_else(|_| SigningKey::from_pkcs8_rsa(&pkcs8).map(|k| (k, SignatureScheme::RsaPssRsaeSha256)))
            .map_err(|_| HandshakeError::NoCommonSigAlg)?;

        Ok(Self { chain, key, scheme })
    }
}

impl CertificateProvider for LoadedIdentity {
    fn chain_bytes(&self) -> &[Vec<u8>] {
        &self.chain
    }

    fn signature_scheme(&self) -> SignatureScheme {
        self.scheme
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        use tls_crypto::provider::Signer;
        self.key.sign(self.scheme, data).map_err(HandshakeError::from)
    }
}

/// Accepts any certificate chain without inspection, logging that it did
/// so. PKI validation is explicitly out of scope for the protocol core; a
/// real deployment supplies its own [`CertificateVerifier`] backed by a
/// trust store, which this binary doesn't attempt to be.
pub struct TrustEveryoneVerifier;

impl CertificateVerifier for TrustEveryoneVerifier {
    fn verify(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<()> {
        log::warn!("skipping certificate-chain validation for {:?} ({} cert(s)) — --insecure was given", server_name, chain.len());
        Ok(())
    }

    fn leaf_public_key(&self, chain: &[Vec<u8>]) -> Result<Vec<u8>> {
        chain.first().cloned().ok_or(HandshakeError::MissingExtension("certificate chain is empty"))
    }
}

fn read_pem_certs(path: &str) -> Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let certs = rustls_pemfile::certs(&mut reader).map_err(io_err)?;
    if certs.is_empty() {
        return Err(HandshakeError::MissingExtension("no certificates found in PEM file"));
    }
    Ok(certs)
}

fn read_pem_pkcs8_key(path: &str) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut reader).map_err(io_err)?;
    keys.pop().ok_or(HandshakeError::MissingExtension("no PKCS#8 private key found in PEM file"))
}

fn io_err(e: io::Error) -> HandshakeError {
    HandshakeError::from(e)
}
