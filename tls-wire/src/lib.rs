//! The TLS 1.3 (RFC 8446) wire codec: handshake messages, extensions, and
//! record-layer framing structures. This crate is pure codec — no I/O, no
//! cryptography — so that it can be fuzzed and unit-tested in isolation.

#![warn(deprecated_in_future)]
#![warn(future_incompatible)]
#![warn(missing_copy_implementations)]
#![warn(nonstandard_style)]
#![warn(rust_2018_compatibility)]
#![warn(rust_2018_idioms)]
#![warn(single_use_lifetimes)]
#![warn(trivial_casts, trivial_numeric_casts)]
#![warn(unused)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod extension;
pub mod handshake;
pub mod record;
pub mod types;

pub use crate::error::CodecError;
pub use crate::types::*;
