//! `pre_shared_key` — [RFC 8446 §4.2.11](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.11).
//!
//! In ClientHello this carries a list of PSK identities plus a *separate*
//! list of HMAC binders, one per identity. The binder
//! bytes occupy the tail of the ClientHello and the handshake layer needs
//! to know their byte offset so it can compute the real transcript hash
//! over everything *before* the binders, HMAC that, and patch the binder
//! bytes in place — [`PreSharedKeyClientHello::binders_section_len`]
//! exposes exactly the byte count it needs to locate that tail.

use crate::codec::{read_opaque, read_u16, read_u32, write_opaque, write_u16, write_u32, LengthPrefix, Reader};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
}

impl PskIdentity {
    fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let identity = read_opaque(c, LengthPrefix::U16)?;
        let obfuscated_ticket_age = read_u32(c)?;
        Ok(Self { identity, obfuscated_ticket_age })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        write_opaque(out, LengthPrefix::U16, &self.identity).unwrap();
        write_u32(out, self.obfuscated_ticket_age);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreSharedKeyClientHello {
    pub identities: Vec<PskIdentity>,
    pub binders: Vec<Vec<u8>>,
}

impl PreSharedKeyClientHello {
    /// Builds a ClientHello PSK extension with zeroed binders of the right
    /// length, to be filled in once the real transcript-hash-dependent
    /// HMAC value is available.
    #[must_use]
    pub fn with_placeholder_binders(identities: Vec<PskIdentity>, binder_len: usize) -> Self {
        let binders = identities.iter().map(|_| vec![0_u8; binder_len]).collect();
        Self { identities, binders }
    }

    /// The number of trailing bytes this extension's *encoded body* spends
    /// on the binders list (2-byte outer length prefix plus each binder's
    /// own 1-byte prefix and body). Handshake code uses this to find and
    /// overwrite the binder bytes inside an already-serialized ClientHello
    /// without re-encoding the rest of the message.
    #[must_use]
    pub fn binders_section_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }

    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let identities_bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut ids_cursor = Reader::new(&identities_bytes);
        let mut identities = Vec::new();
        while (ids_cursor.position() as usize) < identities_bytes.len() {
            identities.push(PskIdentity::read_from(&mut ids_cursor)?);
        }

        let binders_bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut binders_cursor = Reader::new(&binders_bytes);
        let mut binders = Vec::new();
        while (binders_cursor.position() as usize) < binders_bytes.len() {
            binders.push(read_opaque(&mut binders_cursor, LengthPrefix::U8)?);
        }

        Ok(Self { identities, binders })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut ids = Vec::new();
        for identity in &self.identities {
            identity.write_to(&mut ids);
        }
        write_opaque(out, LengthPrefix::U16, &ids).unwrap();

        let mut binders = Vec::new();
        for binder in &self.binders {
            write_opaque(&mut binders, LengthPrefix::U8, binder).unwrap();
        }
        write_opaque(out, LengthPrefix::U16, &binders).unwrap();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreSharedKeyServerHello {
    pub selected_identity: u16,
}

impl PreSharedKeyServerHello {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        Ok(Self { selected_identity: read_u16(c)? })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u16(out, self.selected_identity);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_hello_round_trips_and_binders_section_is_located_correctly() {
        let psk = PreSharedKeyClientHello::with_placeholder_binders(
            vec![PskIdentity { identity: vec![1, 2, 3], obfuscated_ticket_age: 0x1234_5678 }],
            32,
        );
        let mut buf = Vec::new();
        psk.write_to(&mut buf);
        assert_eq!(&buf[buf.len() - psk.binders_section_len()..], &buf[buf.len() - 34..]);
        assert_eq!(PreSharedKeyClientHello::read_from(&mut Reader::new(&buf)).unwrap(), psk);
    }

    #[test]
    fn server_hello_round_trips() {
        let psk = PreSharedKeyServerHello { selected_identity: 0 };
        let mut buf = Vec::new();
        psk.write_to(&mut buf);
        assert_eq!(PreSharedKeyServerHello::read_from(&mut Reader::new(&buf)).unwrap(), psk);
    }
}
