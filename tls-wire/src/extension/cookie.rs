//! `cookie` — [RFC 8446 §4.2.2](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.2).
//! An opaque blob a server hands back in a HelloRetryRequest so it can
//! stay stateless; the client echoes it verbatim in the second ClientHello.

use crate::codec::{read_opaque, write_opaque, LengthPrefix, Reader};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie(pub Vec<u8>);

impl Cookie {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        read_opaque(c, LengthPrefix::U16).map(Self)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_opaque(out, LengthPrefix::U16, &self.0).unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips() {
        let cookie = Cookie(vec![0xde, 0xad, 0xbe, 0xef]);
        let mut buf = Vec::new();
        cookie.write_to(&mut buf);
        assert_eq!(Cookie::read_from(&mut Reader::new(&buf)).unwrap(), cookie);
    }
}
