//! `signature_algorithms` / `signature_algorithms_cert` — RFC 8446 §4.2.3.
//! Both extensions share this exact list shape; `Extension::read_from`
//! dispatches them to the same decoder and tags the result by type.

use crate::codec::{read_opaque, read_u16, write_opaque, write_u16, LengthPrefix, Reader};
use crate::error::Result;
use crate::types::SignatureScheme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSchemeList {
    pub schemes: Vec<SignatureScheme>,
}

impl SignatureSchemeList {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut inner = Reader::new(&bytes);
        let mut schemes = Vec::new();
        while (inner.position() as usize) < bytes.len() {
            schemes.push(SignatureScheme::from(read_u16(&mut inner)?));
        }
        Ok(Self { schemes })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for scheme in &self.schemes {
            write_u16(&mut list, u16::from(*scheme));
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
        let list = SignatureSchemeList { schemes: vec![SignatureScheme::Ed25519, SignatureScheme::EcdsaSecp256r1Sha256] };
        let mut buf = Vec::new();
        list.write_to(&mut buf);
        assert_eq!(SignatureSchemeList::read_from(&mut Reader::new(&buf)).unwrap(), list);
    }
}
