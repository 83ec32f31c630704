//! The sole shipped cryptographic backend, built on the `ring` crate.
//! `ring::aead` for the AEAD suites, `ring::digest` for the transcript and
//! `DeriveSecret` hashes, HMAC-based HKDF (RFC 5869) over `ring::hmac`,
//! `ring::agreement` for X25519/P-256 key exchange, `ring::signature` for
//! RSA-PSS/ECDSA-P256/Ed25519, and `ring::rand::SystemRandom` for the
//! CSPRNG — mirroring the historical rustls/ring pairing.

use ring::rand::SecureRandom;
use ring::{agreement, digest, hmac, rand as ring_rand, signature as ring_sig};

use tls_wire::{CipherSuite, NamedGroup, SignatureScheme};

use crate::error::{CryptoError, Result};
use crate::provider::{Aead, Csprng, EphemeralSecret, Hash, HashContext, Hkdf, KeyExchange, Signer, Verifier};

pub struct RingAead(&'static ring::aead::Algorithm);

impl Aead for RingAead {
    fn key_len(&self) -> usize {
        self.0.key_len()
    }

    fn iv_len(&self) -> usize {
        ring::aead::NONCE_LEN
    }

    fn tag_len(&self) -> usize {
        self.0.tag_len()
    }

    fn seal(&self, key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &mut Vec<u8>) -> Result<()> {
        let unbound = ring::aead::UnboundKey::new(self.0, key).map_err(|_| CryptoError::UnsupportedAlgorithm("aead key"))?;
        let key = ring::aead::LessSafeKey::new(unbound);
        let nonce = ring::aead::Nonce::try_assume_unique_for_key(nonce).map_err(|_| CryptoError::AeadOpenFailure)?;
        key.seal_in_place_append_tag(nonce, ring::aead::Aad::from(aad), plaintext)
            .map_err(|_| CryptoError::AeadOpenFailure)?;
        Ok(())
    }

    fn open<'a>(&self, key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &'a mut [u8]) -> Result<&'a mut [u8]> {
        let unbound = ring::aead::UnboundKey::new(self.0, key).map_err(|_| CryptoError::UnsupportedAlgorithm("aead key"))?;
        let key = ring::aead::LessSafeKey::new(unbound);
        let nonce = ring::aead::Nonce::try_assume_unique_for_key(nonce).map_err(|_| CryptoError::AeadOpenFailure)?;
        key.open_in_place(nonce, ring::aead::Aad::from(aad), ciphertext)
            .map_err(|_| CryptoError::AeadOpenFailure)
    }
}

#[derive(Clone, Copy)]
pub struct RingHash(&'static digest::Algorithm);

struct RingHashContext(digest::Context);

impl HashContext for RingHashContext {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        self.0.finish().as_ref().to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashContext> {
        Box::new(RingHashContext(self.0.clone()))
    }
}

impl Hash for RingHash {
    fn output_len(&self) -> usize {
        self.0.output_len
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        digest::digest(self.0, data).as_ref().to_vec()
    }

    fn new_context(&self) -> Box<dyn HashContext> {
        Box::new(RingHashContext(digest::Context::new(self.0)))
    }
}

/// HKDF-Extract/Expand implemented directly over HMAC per RFC 5869 — ring
/// 0.16's own `hkdf` module fixes the output length to the hash's native
/// size, which is too restrictive for `HKDF-Expand-Label`'s
/// variable-length outputs (e.g. expanding a 32-byte key from a 48-byte
/// PRK).
struct RingHkdf {
    hash: RingHash,
    hmac_alg: hmac::Algorithm,
}

impl Hkdf for RingHkdf {
    fn hash(&self) -> &dyn Hash {
        &self.hash
    }

    fn boxed_hash(&self) -> Box<dyn Hash> {
        Box::new(self.hash)
    }

    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
        let zeros;
        let salt = if salt.is_empty() {
            zeros = vec![0_u8; self.hash.output_len()];
            &zeros[..]
        } else {
            salt
        };
        let key = hmac::Key::new(self.hmac_alg, salt);
        hmac::sign(&key, ikm).as_ref().to_vec()
    }

    fn expand(&self, prk: &[u8], info: &[u8], out_len: usize) -> Result<Vec<u8>> {
        let hash_len = self.hash.output_len();
        let blocks = out_len.div_ceil(hash_len);
        if blocks > 255 {
            return Err(CryptoError::HkdfFailure);
        }

        let key = hmac::Key::new(self.hmac_alg, prk);
        let mut okm = Vec::with_capacity(blocks * hash_len);
        let mut previous: Vec<u8> = Vec::new();
        for counter in 1..=blocks {
            let mut data = Vec::with_capacity(previous.len() + info.len() + 1);
            data.extend_from_slice(&previous);
            data.extend_from_slice(info);
            data.push(counter as u8);
            previous = hmac::sign(&key, &data).as_ref().to_vec();
            okm.extend_from_slice(&previous);
        }
        okm.truncate(out_len);
        Ok(okm)
    }
}

/// The AEAD, hash, and key/IV lengths bound to one cipher suite — each
/// suite binds an AEAD, a hash, a key length, and an IV length.
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub aead: Box<dyn Aead>,
    pub hkdf: Box<dyn Hkdf>,
    pub key_len: usize,
    pub iv_len: usize,
}

/// Looks up the concrete crypto for one of the three mandatory-to-implement
/// TLS 1.3 cipher suites. `CipherSuite::Unknown` and any suite this crate
/// doesn't bind to primitives is `UnsupportedAlgorithm`.
pub fn params_for(suite: CipherSuite) -> Result<CipherSuiteParams> {
    Ok(match suite {
        CipherSuite::Aes128GcmSha256 => CipherSuiteParams {
            suite,
            aead: Box::new(RingAead(&ring::aead::AES_128_GCM)),
            hkdf: Box::new(RingHkdf { hash: RingHash(&digest::SHA256), hmac_alg: hmac::HMAC_SHA256 }),
            key_len: 16,
            iv_len: 12,
        },
        CipherSuite::Aes256GcmSha384 => CipherSuiteParams {
            suite,
            aead: Box::new(RingAead(&ring::aead::AES_256_GCM)),
            hkdf: Box::new(RingHkdf { hash: RingHash(&digest::SHA384), hmac_alg: hmac::HMAC_SHA384 }),
            key_len: 32,
            iv_len: 12,
        },
        CipherSuite::Chacha20Poly1305Sha256 => CipherSuiteParams {
            suite,
            aead: Box::new(RingAead(&ring::aead::CHACHA20_POLY1305)),
            hkdf: Box::new(RingHkdf { hash: RingHash(&digest::SHA256), hmac_alg: hmac::HMAC_SHA256 }),
            key_len: 32,
            iv_len: 12,
        },
        CipherSuite::Unknown(_) => return Err(CryptoError::UnsupportedAlgorithm("cipher suite")),
    })
}

fn group_to_algorithm(group: NamedGroup) -> Result<&'static agreement::Algorithm> {
    match group {
        NamedGroup::X25519 => Ok(&agreement::X25519),
        NamedGroup::Secp256r1 => Ok(&agreement::ECDH_P256),
        _ => Err(CryptoError::UnsupportedAlgorithm("named group")),
    }
}

struct RingEphemeralSecret(agreement::EphemeralPrivateKey, &'static agreement::Algorithm);

impl EphemeralSecret for RingEphemeralSecret {
    fn agree(self: Box<Self>, peer_public: &[u8]) -> Result<Vec<u8>> {
        let peer = agreement::UnparsedPublicKey::new(self.1, peer_public);
        agreement::agree_ephemeral(self.0, &peer, CryptoError::KeyExchangeFailure, |shared_secret| Ok(shared_secret.to_vec()))
    }
}

pub struct RingKeyExchange;

impl KeyExchange for RingKeyExchange {
    fn generate(&self, group: NamedGroup, _rng: &dyn Csprng) -> Result<(Box<dyn EphemeralSecret>, Vec<u8>)> {
        let alg = group_to_algorithm(group)?;
        // ring's own agreement API insists on its own `SecureRandom`
        // rather than our `Csprng` trait object; the `Csprng` the rest of
        // this crate exposes is for handshake-level randomness (hellos,
        // session ids), not ECDHE ephemeral key generation.
        let system_rng = ring_rand::SystemRandom::new();
        let private = agreement::EphemeralPrivateKey::generate(alg, &system_rng).map_err(|_| CryptoError::KeyExchangeFailure)?;
        let public_key = private.compute_public_key().map_err(|_| CryptoError::KeyExchangeFailure)?;
        let public_bytes = public_key.as_ref().to_vec();
        Ok((Box::new(RingEphemeralSecret(private, alg)), public_bytes))
    }
}

fn scheme_to_verification_algorithm(scheme: SignatureScheme) -> Result<&'static dyn ring_sig::VerificationAlgorithm> {
    Ok(match scheme {
        SignatureScheme::RsaPssRsaeSha256 => &ring_sig::RSA_PSS_2048_8192_SHA256,
        SignatureScheme::RsaPssRsaeSha384 => &ring_sig::RSA_PSS_2048_8192_SHA384,
        SignatureScheme::RsaPssRsaeSha512 => &ring_sig::RSA_PSS_2048_8192_SHA512,
        SignatureScheme::EcdsaSecp256r1Sha256 => &ring_sig::ECDSA_P256_SHA256_ASN1,
        SignatureScheme::EcdsaSecp384r1Sha384 => &ring_sig::ECDSA_P384_SHA384_ASN1,
        SignatureScheme::Ed25519 => &ring_sig::ED25519,
        SignatureScheme::Unknown(_) => return Err(CryptoError::UnsupportedAlgorithm("signature scheme")),
    })
}

pub struct RingVerifier;

impl Verifier for RingVerifier {
    fn verify(&self, scheme: SignatureScheme, data: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
        let alg = scheme_to_verification_algorithm(scheme)?;
        ring_sig::UnparsedPublicKey::new(alg, public_key)
            .verify(data, signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

/// A certificate provider's private key, able to sign under whichever
/// scheme matches its own algorithm. Constructed once from a PKCS#8
/// document at connection setup — loading that document from disk is the
/// demo binary's job; this crate never touches a filesystem.
pub enum SigningKey {
    EcdsaP256(ring_sig::EcdsaKeyPair),
    Ed25519(ring_sig::Ed25519KeyPair),
    Rsa(ring_sig::RsaKeyPair),
}

impl SigningKey {
    pub fn from_pkcs8_ecdsa_p256(pkcs8: &[u8]) -> Result<Self> {
        ring_sig::EcdsaKeyPair::from_pkcs8(&ring_sig::ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8)
            .map(Self::EcdsaP256)
            .map_err(|_| CryptoError::SignatureInvalid)
    }

    pub fn from_pkcs8_ed25519(pkcs8: &[u8]) -> Result<Self> {
        ring_sig::Ed25519KeyPair::from_pkcs8(pkcs8).map(Self::Ed25519).map_err(|_| CryptoError::SignatureInvalid)
    }

    pub fn from_pkcs8_rsa(pkcs8_der: &[u8]) -> Result<Self> {
        ring_sig::RsaKeyPair::from_pkcs8(pkcs8_der).map(Self::Rsa).map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl Signer for SigningKey {
    fn sign(&self, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>> {
        let rng = ring_rand::SystemRandom::new();
        match (self, scheme) {
            (Self::EcdsaP256(kp), SignatureScheme::EcdsaSecp256r1Sha256) => {
                kp.sign(&rng, data).map(|sig| sig.as_ref().to_vec()).map_err(|_| CryptoError::SignatureInvalid)
            }
            (Self::Ed25519(kp), SignatureScheme::Ed25519) => Ok(kp.sign(data).as_ref().to_vec()),
            (Self::Rsa(kp), scheme @ (SignatureScheme::RsaPssRsaeSha256 | SignatureScheme::RsaPssRsaeSha384 | SignatureScheme::RsaPssRsaeSha512)) => {
                let padding: &dyn ring_sig::RsaEncoding = match scheme {
                    SignatureScheme::RsaPssRsaeSha256 => ring_sig::RSA_PSS_SHA256,
                    SignatureScheme::RsaPssRsaeSha384 => ring_sig::RSA_PSS_SHA384,
                    _ => ring_sig::RSA_PSS_SHA512,
                };
                let mut sig = vec![0_u8; kp.public_modulus_len()];
                kp.sign(padding, &rng, data, &mut sig).map_err(|_| CryptoError::SignatureInvalid)?;
                Ok(sig)
            }
            _ => Err(CryptoError::UnsupportedAlgorithm("signature scheme does not match key type")),
        }
    }
}

pub struct RingCsprng(ring_rand::SystemRandom);

impl RingCsprng {
    #[must_use]
    pub fn new() -> Self {
        Self(ring_rand::SystemRandom::new())
    }
}

impl Default for RingCsprng {
    fn default() -> Self {
        Self::new()
    }
}

impl Csprng for RingCsprng {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.0.fill(buf).map_err(|_| CryptoError::RngFailure)
    }
}

/// Exposes a `ring`-backed SHA-256 `Hkdf` to sibling modules' test suites
/// (`schedule.rs`, `transcript.rs`) without making `RingHkdf` itself
/// public — nothing outside this crate should construct a backend type
/// directly rather than going through `params_for`.
#[cfg(test)]
pub(crate) fn test_sha256_hkdf() -> Box<dyn Hkdf> {
    Box::new(RingHkdf { hash: RingHash(&digest::SHA256), hmac_alg: hmac::HMAC_SHA256 })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aes_128_gcm_round_trips() {
        let params = params_for(CipherSuite::Aes128GcmSha256).unwrap();
        let key = vec![0x42_u8; params.key_len];
        let nonce = [0x24_u8; 12];
        let aad = b"header";

        let mut buf = b"hello world".to_vec();
        params.aead.seal(&key, &nonce, aad, &mut buf).unwrap();
        assert_ne!(buf, b"hello world");

        let opened = params.aead.open(&key, &nonce, aad, &mut buf).unwrap();
        assert_eq!(opened, b"hello world");
    }

    #[test]
    fn aead_open_fails_on_bit_flip() {
        let params = params_for(CipherSuite::Aes128GcmSha256).unwrap();
        let key = vec![0x11_u8; params.key_len];
        let nonce = [0x01_u8; 12];

        let mut buf = b"sensitive".to_vec();
        params.aead.seal(&key, &nonce, b"", &mut buf).unwrap();
        buf[0] ^= 0x01;
        assert!(params.aead.open(&key, &nonce, b"", &mut buf).is_err());
    }

    #[test]
    fn hkdf_expand_matches_rfc5869_test_case_1() {
        // RFC 5869 Appendix A.1 (SHA-256)
        let ikm = hex("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let salt = hex("000102030405060708090a0b0c");
        let info = hex("f0f1f2f3f4f5f6f7f8f9");
        let expected = hex(
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865",
        );

        let hkdf = RingHkdf { hash: RingHash(&digest::SHA256), hmac_alg: hmac::HMAC_SHA256 };
        let prk = hkdf.extract(&salt, &ikm);
        let okm = hkdf.expand(&prk, &info, 42).unwrap();
        assert_eq!(okm, expected);
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap()).collect()
    }
}
