//! Opening the TCP connections this binary's handshake runs over. The
//! protocol core treats the network purely as a `Read + Write`
//! collaborator; this module is where that collaborator actually gets
//! constructed, kept out of the `tls-handshake` crate since socket setup
//! isn't the handshake's concern.

use std::io;
use std::net::{TcpListener, TcpStream};

/// Connects to `addr` (`host:port`) for `tls13ep client`.
pub fn connect(addr: &str) -> io::Result<TcpStream> {
    TcpStream::connect(addr)
}

/// Binds `addr` (`host:port`) for `tls13ep server` and accepts exactly one
/// connection — this demonstration binary handles one handshake per
/// invocation rather than forking a listener loop, since a connection's
/// state machine is single-owner and not meant to be shared across
/// connections anyway.
pub fn accept_one(addr: &str) -> io::Result<TcpStream> {
    let listener = TcpListener::bind(addr)?;
    let (stream, _peer) = listener.accept()?;
    Ok(stream)
}
