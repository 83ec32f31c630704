//! `supported_versions` — [RFC 8446 §4.2.1](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.1).
//! A list in ClientHello, a single fixed `0x0304` scalar in ServerHello and
//! HelloRetryRequest — the two shapes are distinguished by
//! [`crate::extension::ExtensionContext`] in the caller, not here.

use crate::codec::{read_opaque, read_u16, write_opaque, write_u16, LengthPrefix, Reader};
use crate::error::Result;

/// TLS 1.3, RFC 8446.
pub const TLS1_3: u16 = 0x0304;

pub(crate) fn read_client_hello(c: &mut Reader<'_>) -> Result<Vec<u16>> {
    let bytes = read_opaque(c, LengthPrefix::U8)?;
    let mut inner = Reader::new(&bytes);
    let mut versions = Vec::new();
    while (inner.position() as usize) < bytes.len() {
        versions.push(read_u16(&mut inner)?);
    }
    Ok(versions)
}

pub(crate) fn write_client_hello(out: &mut Vec<u8>, versions: &[u16]) {
    let mut list = Vec::new();
    for v in versions {
        write_u16(&mut list, *v);
    }
    write_opaque(out, LengthPrefix::U8, &list).unwrap();
}

pub(crate) fn read_server_hello(c: &mut Reader<'_>) -> Result<u16> {
    read_u16(c)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_hello_list_round_trips() {
        let versions = vec![TLS1_3, 0x0303];
        let mut buf = Vec::new();
        write_client_hello(&mut buf, &versions);
        assert_eq!(read_client_hello(&mut Reader::new(&buf)).unwrap(), versions);
    }

    #[test]
    fn server_hello_scalar_is_fixed_to_tls13() {
        let mut buf = Vec::new();
        write_u16(&mut buf, TLS1_3);
        assert_eq!(read_server_hello(&mut Reader::new(&buf)).unwrap(), TLS1_3);
    }
}
