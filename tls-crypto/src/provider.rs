//! The cryptographic provider interface: AEAD, Hash,
//! HKDF, ECDHE, and signature traits that the key schedule and handshake
//! layer are written against, plus a CSPRNG marker trait. `ring_backend`
//! is the sole shipped implementation; the core crates never touch a raw
//! primitive directly.

use tls_wire::{NamedGroup, SignatureScheme};

use crate::error::Result;

/// Authenticated encryption with associated data, keyed and nonced by the
/// caller (the key schedule and record layer own key/nonce derivation;
/// this trait is pure cryptographic plumbing).
pub trait Aead: Send + Sync {
    fn key_len(&self) -> usize;
    fn iv_len(&self) -> usize;
    fn tag_len(&self) -> usize;

    /// Encrypts `plaintext` in place, appending the authentication tag.
    fn seal(&self, key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &mut Vec<u8>) -> Result<()>;

    /// Decrypts `ciphertext` in place (tag included at the tail),
    /// returning the plaintext slice with the tag truncated off.
    fn open<'a>(&self, key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &'a mut [u8]) -> Result<&'a mut [u8]>;
}

/// A one-shot and incremental hash, as required by the transcript hash
/// (incremental) and `DeriveSecret` (one-shot).
pub trait Hash: Send + Sync {
    fn output_len(&self) -> usize;
    fn digest(&self, data: &[u8]) -> Vec<u8>;
    fn new_context(&self) -> Box<dyn HashContext>;
}

/// An in-progress incremental hash, used by the rolling transcript hash so
/// it never has to re-hash the whole transcript for every message.
pub trait HashContext: Send {
    fn update(&mut self, data: &[u8]);
    fn finish(self: Box<Self>) -> Vec<u8>;

    /// Snapshots the current state without consuming it — used for the
    /// PSK-binder "clone the transcript, hash the snapshot" technique
    /// and for reading the running hash mid-handshake.
    fn clone_box(&self) -> Box<dyn HashContext>;
}

/// HKDF-Extract / HKDF-Expand (RFC 5869), bound to one hash function.
pub trait Hkdf: Send + Sync {
    fn hash(&self) -> &dyn Hash;
    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8>;
    fn expand(&self, prk: &[u8], info: &[u8], out_len: usize) -> Result<Vec<u8>>;

    /// An owned handle on the same hash algorithm `hash()` borrows, for
    /// building a [`crate::TranscriptHash`] (which outlives any one
    /// `Hkdf` borrow) bound to this suite.
    fn boxed_hash(&self) -> Box<dyn Hash>;
}

/// One side of an in-progress (EC)DHE exchange: a generated keypair whose
/// private half is consumed by `agree`.
pub trait EphemeralSecret: Send {
    fn agree(self: Box<Self>, peer_public: &[u8]) -> Result<Vec<u8>>;
}

/// Key-pair generation and scalar multiplication for the supported named
/// groups (X25519, secp256r1).
pub trait KeyExchange: Send + Sync {
    /// Generates an ephemeral keypair for `group`, returning the secret
    /// half (to be consumed exactly once by `EphemeralSecret::agree`) and
    /// the public key bytes to place in a `KeyShareEntry`.
    fn generate(&self, group: NamedGroup, rng: &dyn Csprng) -> Result<(Box<dyn EphemeralSecret>, Vec<u8>)>;
}

/// Signing (the certificate provider's private key) and verification (the
/// peer's certificate public key) for the supported signature schemes.
pub trait Signer: Send + Sync {
    fn sign(&self, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>>;
}

pub trait Verifier: Send + Sync {
    fn verify(&self, scheme: SignatureScheme, data: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()>;
}

/// A cryptographically secure RNG, callable without locking.
pub trait Csprng: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}
