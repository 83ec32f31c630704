//! `key_share` — [RFC 8446 §4.2.8](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.8).
//! Polymorphic by handshake context: a list of entries in
//! ClientHello, a single entry in ServerHello, and just a selected group
//! (no key material) in HelloRetryRequest.
//!
//! A malformed `key_share` is fatal per RFC 8446 §4.2.8 ("An empty
//! KeyShareClientHello ... MUST be ... illegal_parameter"); callers
//! propagate decode errors here rather than degrading to `Unknown`.

use crate::codec::{read_opaque, read_u16, write_opaque, write_u16, LengthPrefix, Reader};
use crate::error::Result;
use crate::types::NamedGroup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let group = NamedGroup::from(read_u16(c)?);
        let key_exchange = read_opaque(c, LengthPrefix::U16)?;
        Ok(Self { group, key_exchange })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u16(out, u16::from(self.group));
        write_opaque(out, LengthPrefix::U16, &self.key_exchange).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareClientHello {
    pub entries: Vec<KeyShareEntry>,
}

impl KeyShareClientHello {
    #[must_use]
    pub fn find(&self, group: NamedGroup) -> Option<&KeyShareEntry> {
        self.entries.iter().find(|e| e.group == group)
    }

    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut inner = Reader::new(&bytes);
        let mut entries = Vec::new();
        while (inner.position() as usize) < bytes.len() {
            entries.push(KeyShareEntry::read_from(&mut inner)?);
        }
        Ok(Self { entries })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for entry in &self.entries {
            entry.write_to(&mut list);
        }
        write_opaque(out, LengthPrefix::U16, &list).unwrap();
    }
}

/// The ServerHello shape: exactly one entry, no outer length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareServerHello(pub KeyShareEntry);

/// The HelloRetryRequest shape: just the group the server wants retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShareHelloRetryRequest(pub NamedGroup);

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_hello_list_round_trips() {
        let ch = KeyShareClientHello {
            entries: vec![
                KeyShareEntry { group: NamedGroup::X25519, key_exchange: vec![1; 32] },
                KeyShareEntry { group: NamedGroup::Secp256r1, key_exchange: vec![2; 65] },
            ],
        };
        let mut buf = Vec::new();
        ch.write_to(&mut buf);
        assert_eq!(KeyShareClientHello::read_from(&mut Reader::new(&buf)).unwrap(), ch);
        assert_eq!(ch.find(NamedGroup::X25519).unwrap().key_exchange, vec![1; 32]);
    }

    #[test]
    fn server_hello_entry_has_no_outer_list_prefix() {
        let entry = KeyShareEntry { group: NamedGroup::X25519, key_exchange: vec![3; 32] };
        let mut buf = Vec::new();
        entry.write_to(&mut buf);
        assert_eq!(KeyShareEntry::read_from(&mut Reader::new(&buf)).unwrap(), entry);
    }
}
