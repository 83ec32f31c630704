//! Cryptographic provider interface, `ring` backend, key schedule, and
//! transcript hash for the TLS 1.3 implementation in `tls-handshake`. This
//! crate owns every byte that touches a raw primitive; `tls-wire` and
//! `tls-handshake` call through the traits in `provider` and never import
//! `ring` directly.

#![warn(
    deprecated_in_future,
    future_incompatible,
    missing_copy_implementations,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unused
)]
#![deny(unsafe_code)]

mod error;
mod ring_backend;
mod schedule;
mod transcript;

pub mod provider;

pub use crate::error::CryptoError;
pub use crate::ring_backend::{params_for, CipherSuiteParams, RingCsprng, RingKeyExchange, RingVerifier, SigningKey};
pub use crate::schedule::{derive_secret, finished_mac, hkdf_expand_label, resumption_psk, KeySchedule};
pub use crate::transcript::TranscriptHash;
