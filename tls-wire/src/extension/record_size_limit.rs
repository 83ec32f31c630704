//! `record_size_limit` — [RFC 8449](https://datatracker.ietf.org/doc/html/rfc8449).
//! A 2-byte limit; TLS 1.3 requires it fall in `[64, 2^14 + 1]`.

use crate::codec::{read_u16, write_u16, Reader};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSizeLimit(u16);

impl RecordSizeLimit {
    pub const MIN: u16 = 64;
    pub const MAX: u16 = (1 << 14) + 1;

    pub fn new(limit: u16) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&limit) {
            Ok(Self(limit))
        } else {
            Err(CodecError::InvalidValue { field: "record_size_limit", value: limit as u64 })
        }
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        Self::new(read_u16(c)?)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u16(out, self.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_values_outside_the_tls13_range() {
        assert!(RecordSizeLimit::new(63).is_err());
        assert!(RecordSizeLimit::new(RecordSizeLimit::MAX + 1).is_err());
        assert!(RecordSizeLimit::new(512).is_ok());
    }

    #[test]
    fn round_trips() {
        let limit = RecordSizeLimit::new(512).unwrap();
        let mut buf = Vec::new();
        limit.write_to(&mut buf);
        assert_eq!(RecordSizeLimit::read_from(&mut Reader::new(&buf)).unwrap(), limit);
    }
}
