//! Connection-state scaffolding, the record layer, the alert taxonomy,
//! session tickets, key logging, and the client and server handshake
//! state machines.
//!
//! `tls-wire` supplies the wire shapes; this crate supplies the I/O, the
//! crypto-schedule wiring (via `tls-crypto`), and the ordering rules that
//! turn a byte stream into a completed, authenticated connection.

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

pub mod alert;
pub mod cert;
pub mod client;
pub mod connection;
pub mod error;
pub mod keylog;
pub mod record;
pub mod server;
pub mod ticket;

pub use crate::connection::{CryptoProviders, Epoch, NegotiatedParams, Role};
pub use crate::error::{HandshakeError, Result};
