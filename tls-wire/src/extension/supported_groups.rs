//! `supported_groups` — [RFC 8446 §4.2.7](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.7).

use crate::codec::{read_opaque, read_u16, write_opaque, write_u16, LengthPrefix, Reader};
use crate::error::Result;
use crate::types::NamedGroup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedGroupList {
    pub groups: Vec<NamedGroup>,
}

impl SupportedGroupList {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut inner = Reader::new(&bytes);
        let mut groups = Vec::new();
        while (inner.position() as usize) < bytes.len() {
            groups.push(NamedGroup::from(read_u16(&mut inner)?));
        }
        Ok(Self { groups })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for group in &self.groups {
            write_u16(&mut list, u16::from(*group));
        }
        write_opaque(out, LengthPrefix::U16, &list).unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips() {
        let list = SupportedGroupList { groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1] };
        let mut buf = Vec::new();
        list.write_to(&mut buf);
        assert_eq!(SupportedGroupList::read_from(&mut Reader::new(&buf)).unwrap(), list);
    }
}
