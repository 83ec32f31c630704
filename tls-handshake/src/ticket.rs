//! Session tickets and the server-side early-data replay strike
//! register.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use tls_wire::CipherSuite;

use crate::error::{HandshakeError, Result};

/// Tickets longer-lived than this are clamped to a 7-day lifetime.
pub const MAX_LIFETIME_SECONDS: u32 = 7 * 24 * 60 * 60;

/// A resumption ticket as held by a client (it never sees the server's
/// in-memory strike register — that's purely a server-side defense).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub ticket: Vec<u8>,
    pub ticket_nonce: Vec<u8>,
    pub ticket_age_add: u32,
    /// Seconds; `0` means "do not cache".
    pub lifetime_seconds: u32,
    pub resumption_master_secret: Vec<u8>,
    pub cipher_suite: CipherSuite,
    /// When this ticket was received, for `obfuscated_ticket_age`
    /// computation — a local-clock-only value, never serialized.
    pub received_at: SystemTime,
}

impl Ticket {
    #[must_use]
    pub fn new(
        ticket: Vec<u8>,
        ticket_nonce: Vec<u8>,
        ticket_age_add: u32,
        lifetime_seconds: u32,
        resumption_master_secret: Vec<u8>,
        cipher_suite: CipherSuite,
    ) -> Self {
        Self {
            ticket,
            ticket_nonce,
            ticket_age_add,
            lifetime_seconds: lifetime_seconds.min(MAX_LIFETIME_SECONDS),
            resumption_master_secret,
            cipher_suite,
            received_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        if self.lifetime_seconds == 0 {
            return false;
        }
        let age = self.received_at.elapsed().unwrap_or_default().as_secs();
        age < u64::from(self.lifetime_seconds)
    }

    /// RFC 8446 §4.2.11.1: `obfuscated_ticket_age = (age_in_ms + ticket_age_add) mod 2^32`.
    #[must_use]
    pub fn obfuscated_ticket_age(&self) -> u32 {
        let age_ms = self.received_at.elapsed().unwrap_or_default().as_millis() as u32;
        age_ms.wrapping_add(self.ticket_age_add)
    }

    /// Serializes this ticket to an implementation-defined persisted
    /// form: an opaque byte sequence containing the ticket blob plus its
    /// resumption secret and metadata, which must round-trip through
    /// [`Ticket::import`]. `received_at` is not part of the persisted form —
    /// rehydrating from disk resets the age clock to "just now", which is
    /// conservative (it under-states, never over-states, ticket age).
    #[must_use]
    pub fn export(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u16::from(self.cipher_suite).to_be_bytes());
        out.extend_from_slice(&self.ticket_age_add.to_be_bytes());
        out.extend_from_slice(&self.lifetime_seconds.to_be_bytes());
        write_vec(&mut out, &self.ticket_nonce);
        write_vec(&mut out, &self.ticket);
        write_vec(&mut out, &self.resumption_master_secret);
        out
    }

    pub fn import(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let cipher_suite = CipherSuite::from(read_u16(&mut cursor)?);
        let ticket_age_add = read_u32(&mut cursor)?;
        let lifetime_seconds = read_u32(&mut cursor)?;
        let ticket_nonce = read_vec(&mut cursor)?;
        let ticket = read_vec(&mut cursor)?;
        let resumption_master_secret = read_vec(&mut cursor)?;
        Ok(Self { ticket, ticket_nonce, ticket_age_add, lifetime_seconds, resumption_master_secret, cipher_suite, received_at: SystemTime::now() })
    }
}

fn write_vec(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn read_u16(cursor: &mut &[u8]) -> Result<u16> {
    take(cursor, 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32> {
    take(cursor, 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_vec(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    let len = read_u32(cursor)? as usize;
    take(cursor, len).map(<[u8]>::to_vec)
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(HandshakeError::WireDecode(tls_wire::CodecError::Truncated));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

/// Server-side defense against early-data replay ("implementers should
/// add a server-side strike-register
/// keyed by (ticket, obfuscated_ticket_age)"). First sighting of a pair is
/// accepted and recorded; any repeat marks the early data as replayed so
/// the server can fall back to 1-RTT without tearing down the connection
/// (RFC 8446 §8's non-fatal early-data rejection path).
#[derive(Default)]
pub struct StrikeRegister {
    seen: HashSet<(Vec<u8>, u32)>,
}

impl StrikeRegister {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this is the first time this (ticket,
    /// obfuscated_ticket_age) pair has been observed — accept early data.
    /// Returns `false` on a repeat — reject early data, handshake
    /// continues at 1-RTT.
    pub fn observe(&mut self, ticket: &[u8], obfuscated_ticket_age: u32) -> bool {
        self.seen.insert((ticket.to_vec(), obfuscated_ticket_age))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ticket_round_trips_through_export_import() {
        let ticket = Ticket::new(vec![1, 2, 3], vec![0x01], 0x1234_5678, 7200, vec![9; 48], CipherSuite::Aes128GcmSha256);
        let bytes = ticket.export();
        let restored = Ticket::import(&bytes).unwrap();
        assert_eq!(restored.ticket, ticket.ticket);
        assert_eq!(restored.ticket_nonce, ticket.ticket_nonce);
        assert_eq!(restored.ticket_age_add, ticket.ticket_age_add);
        assert_eq!(restored.lifetime_seconds, ticket.lifetime_seconds);
        assert_eq!(restored.resumption_master_secret, ticket.resumption_master_secret);
        assert_eq!(restored.cipher_suite, ticket.cipher_suite);
    }

    #[test]
    fn lifetime_is_clamped_to_seven_days() {
        let ticket = Ticket::new(vec![], vec![], 0, MAX_LIFETIME_SECONDS + 100, vec![], CipherSuite::Aes128GcmSha256);
        assert_eq!(ticket.lifetime_seconds, MAX_LIFETIME_SECONDS);
    }

    #[test]
    fn strike_register_accepts_once_then_flags_replay() {
        let mut register = StrikeRegister::new();
        assert!(register.observe(b"ticket", 42));
        assert!(!register.observe(b"ticket", 42));
        assert!(register.observe(b"ticket", 43));
    }
}
