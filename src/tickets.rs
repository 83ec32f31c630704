//! Persisting session tickets to disk between invocations of this
//! demonstration binary, as an opaque byte sequence round-tripped through
//! a file. `tls-handshake::ticket::Ticket` already knows how to serialize
//! itself; this module only adds the JSON envelope and the `PskStore`
//! lookup the server side needs.
//!
//! One file holds a JSON array of hex-encoded exported tickets, in the
//! same spirit as the `quic-transport-params` crate's base64-over-JSON
//! inspection format, swapped to hex here since a ticket's bytes never
//! need to look like a short, copy-pasteable blob.

use std::fs;

use tls_handshake::error::{HandshakeError, Result};
use tls_handshake::server::PskStore;
use tls_handshake::ticket::Ticket;

/// Reads every ticket out of `path`, skipping (with a warning) any entry
/// that no longer decodes — a stale file from an earlier, incompatible
/// build should not crash the binary.
pub fn load(path: &str) -> Result<Vec<Ticket>> {
    let text = fs::read_to_string(path).map_err(HandshakeError::from)?;
    let parsed = json::parse(&text).map_err(|_| HandshakeError::MissingExtension("ticket file is not valid JSON"))?;

    let mut tickets = Vec::new();
    for entry in parsed.members() {
        let Some(hex) = entry.as_str() else { continue };
        match decode_hex(hex).and_then(|bytes| Ticket::import(&bytes)) {
            Ok(ticket) => tickets.push(ticket),
            Err(_) => log::warn!("skipping unreadable ticket entry in {path}"),
        }
    }
    Ok(tickets)
}

/// Reads the single most useful ticket from `path` for a client's next
/// connection attempt — the first one that's still usable under its
/// lifetime.
pub fn load_one(path: &str) -> Result<Option<Ticket>> {
    Ok(load(path)?.into_iter().find(Ticket::is_usable))
}

/// Appends `ticket` to whatever's already in `path`, creating it if
/// necessary.
pub fn append(path: &str, ticket: &Ticket) -> Result<()> {
    let mut tickets = load(path).unwrap_or_default();
    tickets.push(ticket.clone());
    save(path, &tickets)
}

/// Overwrites `path` with exactly `tickets`.
pub fn save(path: &str, tickets: &[Ticket]) -> Result<()> {
    let mut array = json::JsonValue::new_array();
    for ticket in tickets {
        array.push(encode_hex(&ticket.export())).ok();
    }
    fs::write(path, json::stringify_pretty(array, 2)).map_err(HandshakeError::from)
}

/// Looks a `pre_shared_key` identity up among tickets loaded from one
/// file — every ticket's identity on the wire is its own `ticket` field,
/// per RFC 8446 §4.2.11.
pub struct FileBackedPskStore {
    tickets: Vec<Ticket>,
}

impl FileBackedPskStore {
    pub fn load(path: &str) -> Result<Self> {
        Ok(Self { tickets: load(path)? })
    }
}

impl PskStore for FileBackedPskStore {
    fn find(&self, identity: &[u8]) -> Option<Ticket> {
        self.tickets.iter().find(|t| t.ticket == identity).cloned()
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(HandshakeError::MissingExtension("ticket hex has odd length"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| HandshakeError::MissingExtension("ticket hex is invalid")))
        .collect()
}
