//! Codec primitives: big-endian integers, length-prefixed opaque vectors,
//! and the `intToEnum`-style unknown-tolerant enum helper.
//!
//! The global invariant every encodable type in this crate upholds:
//! `value.length() == value.encode().len()`.

pub(crate) use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
pub(crate) use std::io::Cursor;

use crate::error::{CodecError, Result};

/// A cursor over a borrowed byte slice, as used throughout this crate's
/// decoders.
pub type Reader<'a> = Cursor<&'a [u8]>;

pub fn read_u8(c: &mut Reader<'_>) -> Result<u8> {
    c.read_u8().map_err(Into::into)
}

pub fn read_u16(c: &mut Reader<'_>) -> Result<u16> {
    c.read_u16::<BigEndian>().map_err(Into::into)
}

/// Reads a 24-bit big-endian integer (used for handshake message lengths
/// and 3-byte opaque vector prefixes).
pub fn read_u24(c: &mut Reader<'_>) -> Result<u32> {
    let hi = read_u8(c)? as u32;
    let lo = read_u16(c)? as u32;
    Ok((hi << 16) | lo)
}

pub fn read_u32(c: &mut Reader<'_>) -> Result<u32> {
    c.read_u32::<BigEndian>().map_err(Into::into)
}

pub fn read_u64(c: &mut Reader<'_>) -> Result<u64> {
    c.read_u64::<BigEndian>().map_err(Into::into)
}

pub fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.write_u8(v).expect("writing to a Vec never fails")
}

pub fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.write_u16::<BigEndian>(v).expect("writing to a Vec never fails")
}

pub fn write_u24(out: &mut Vec<u8>, v: u32) {
    assert!(v <= 0x00ff_ffff, "value does not fit in 24 bits");
    out.push((v >> 16) as u8);
    out.write_u16::<BigEndian>(v as u16).expect("writing to a Vec never fails");
}

pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.write_u32::<BigEndian>(v).expect("writing to a Vec never fails")
}

pub fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.write_u64::<BigEndian>(v).expect("writing to a Vec never fails")
}

/// The width of a length prefix on an opaque vector, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    U8,
    U16,
    U24,
}

impl LengthPrefix {
    const fn max_len(self) -> usize {
        match self {
            Self::U8 => 0xff,
            Self::U16 => 0xffff,
            Self::U24 => 0x00ff_ffff,
        }
    }
}

/// Reads a length-prefixed opaque vector whose length prefix is 1, 2, or 3
/// bytes, validating that the prefix does not exceed the bytes remaining
/// in the enclosing frame.
pub fn read_opaque(c: &mut Reader<'_>, prefix: LengthPrefix) -> Result<Vec<u8>> {
    let len = match prefix {
        LengthPrefix::U8 => read_u8(c)? as usize,
        LengthPrefix::U16 => read_u16(c)? as usize,
        LengthPrefix::U24 => read_u24(c)? as usize,
    };

    let available = c.get_ref().len().saturating_sub(c.position() as usize);
    if len > available {
        return Err(CodecError::Overlong { stated_length: len, available });
    }

    let mut buf = vec![0_u8; len];
    std::io::Read::read_exact(c, &mut buf)?;
    Ok(buf)
}

/// Writes `data` with a length prefix of the given width.
///
/// # Errors
///
/// Returns [`CodecError::EncodeShort`] if `data` is longer than the prefix
/// width can represent.
pub fn write_opaque(out: &mut Vec<u8>, prefix: LengthPrefix, data: &[u8]) -> Result<()> {
    if data.len() > prefix.max_len() {
        return Err(CodecError::EncodeShort { what: "opaque vector" });
    }
    match prefix {
        LengthPrefix::U8 => write_u8(out, data.len() as u8),
        LengthPrefix::U16 => write_u16(out, data.len() as u16),
        LengthPrefix::U24 => write_u24(out, data.len() as u32),
    }
    out.extend_from_slice(data);
    Ok(())
}

/// The number of bytes [`write_opaque`] would emit for `data` of this length.
#[must_use]
pub fn opaque_len(prefix: LengthPrefix, data_len: usize) -> usize {
    let prefix_len = match prefix {
        LengthPrefix::U8 => 1,
        LengthPrefix::U16 => 2,
        LengthPrefix::U24 => 3,
    };
    prefix_len + data_len
}

/// Implemented by every wire enum that degrades unknown values to a
/// sentinel rather than failing to decode — used for GREASE values and
/// forward compatibility, per RFC 8446 §4.2.7 ("implementations MUST NOT
/// fail").
pub trait UnknownFallback: Sized {
    fn from_wire_value(value: u16) -> Self;
    fn to_wire_value(self) -> u16;
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn u24_round_trips() {
        for v in [0, 1, 0xff, 0x0100, 0x00ff_ffff] {
            let mut buf = Vec::new();
            write_u24(&mut buf, v);
            assert_eq!(buf.len(), 3);
            assert_eq!(read_u24(&mut Cursor::new(&buf)).unwrap(), v);
        }
    }

    #[test]
    fn opaque_rejects_overlong_prefix() {
        // prefix claims 10 bytes but only 2 remain
        let buf = [0x0a, 0x01, 0x02];
        let mut c = Cursor::new(&buf[..]);
        assert_eq!(
            read_opaque(&mut c, LengthPrefix::U8),
            Err(CodecError::Overlong { stated_length: 10, available: 2 })
        );
    }

    #[test]
    fn opaque_round_trips_and_length_matches() {
        let data = vec![1, 2, 3, 4, 5];
        let mut buf = Vec::new();
        write_opaque(&mut buf, LengthPrefix::U16, &data).unwrap();
        assert_eq!(buf.len(), opaque_len(LengthPrefix::U16, data.len()));

        let mut c = Cursor::new(&buf[..]);
        assert_eq!(read_opaque(&mut c, LengthPrefix::U16).unwrap(), data);
    }
}
