//! `application_layer_protocol_negotiation` — [RFC 7301](https://datatracker.ietf.org/doc/html/rfc7301).
//! A client sends a list of protocol names; a server echoes back exactly
//! one.

use crate::codec::{read_opaque, write_opaque, LengthPrefix, Reader};
use crate::error::Result;
use crate::extension::ExtensionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlpnProtocols {
    Offered(Vec<Vec<u8>>),
    Selected(Vec<u8>),
}

impl AlpnProtocols {
    pub(crate) fn read_from(c: &mut Reader<'_>, context: ExtensionContext) -> Result<Self> {
        let list_bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut list_cursor = Reader::new(&list_bytes);
        let mut protocols = Vec::new();
        while (list_cursor.position() as usize) < list_bytes.len() {
            protocols.push(read_opaque(&mut list_cursor, LengthPrefix::U8)?);
        }

        Ok(match context {
            ExtensionContext::ClientHello => Self::Offered(protocols),
            _ => Self::Selected(protocols.into_iter().next().unwrap_or_default()),
        })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        match self {
            Self::Offered(protocols) => {
                for p in protocols {
                    write_opaque(&mut list, LengthPrefix::U8, p).unwrap();
                }
            }
            Self::Selected(protocol) => write_opaque(&mut list, LengthPrefix::U8, protocol).unwrap(),
        }
        write_opaque(out, LengthPrefix::U16, &list).unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_side_round_trips_a_protocol_list() {
        let alpn = AlpnProtocols::Offered(vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
        let mut buf = Vec::new();
        alpn.write_to(&mut buf);
        assert_eq!(AlpnProtocols::read_from(&mut Reader::new(&buf), ExtensionContext::ClientHello).unwrap(), alpn);
    }

    #[test]
    fn server_side_selects_exactly_one() {
        let alpn = AlpnProtocols::Selected(b"h2".to_vec());
        let mut buf = Vec::new();
        alpn.write_to(&mut buf);
        assert_eq!(
            AlpnProtocols::read_from(&mut Reader::new(&buf), ExtensionContext::EncryptedExtensions).unwrap(),
            alpn
        );
    }
}
