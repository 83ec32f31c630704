//! `early_data` — [RFC 8446 §4.2.10](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.10).
//! Shape varies by context: empty in ClientHello and EncryptedExtensions
//! (a bare presence flag), a `max_early_data_size` u32 in NewSessionTicket.

use crate::codec::{read_u32, write_u32, Reader};
use crate::error::Result;
use crate::extension::ExtensionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyDataIndication {
    /// Sent by a client offering early data, or a server accepting it.
    /// Carries no body.
    Indication,
    /// Sent in `NewSessionTicket` to bound how much early data the ticket
    /// may be redeemed for.
    MaxSize(u32),
}

impl EarlyDataIndication {
    pub(crate) fn read_from(c: &mut Reader<'_>, context: ExtensionContext) -> Result<Self> {
        match context {
            ExtensionContext::NewSessionTicket => Ok(Self::MaxSize(read_u32(c)?)),
            _ => Ok(Self::Indication),
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        if let Self::MaxSize(size) = self {
            write_u32(out, *size);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indication_is_empty() {
        let mut buf = Vec::new();
        EarlyDataIndication::Indication.write_to(&mut buf);
        assert!(buf.is_empty());
        assert_eq!(
            EarlyDataIndication::read_from(&mut Reader::new(&buf), ExtensionContext::ClientHello).unwrap(),
            EarlyDataIndication::Indication
        );
    }

    #[test]
    fn max_size_round_trips_in_ticket_context() {
        let mut buf = Vec::new();
        EarlyDataIndication::MaxSize(16_384).write_to(&mut buf);
        assert_eq!(
            EarlyDataIndication::read_from(&mut Reader::new(&buf), ExtensionContext::NewSessionTicket).unwrap(),
            EarlyDataIndication::MaxSize(16_384)
        );
    }
}
