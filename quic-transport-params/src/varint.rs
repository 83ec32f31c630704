//! QUIC variable-length integers.
//!
//! # References
//!
//! * [RFC 9000 §16](https://datatracker.ietf.org/doc/html/rfc9000#section-16)

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// The largest value a QUIC variable-length integer can hold (62 usable bits).
pub const MAX_VARINT: u64 = (1 << 62) - 1;

/// Reads one QUIC variable-length integer from the cursor.
///
/// The top two bits of the first byte select the total length (1, 2, 4, or
/// 8 bytes); any of the four encoded forms is accepted regardless of
/// whether it is the shortest form for the value, per RFC 9000 §16.
pub fn read_varint(cursor: &mut Cursor<&[u8]>) -> io::Result<u64> {
    let first = cursor.read_u8()?;
    let tag = first >> 6;
    let mut value = u64::from(first & 0b0011_1111);

    let extra_bytes = match tag {
        0b00 => 0,
        0b01 => 1,
        0b10 => 3,
        0b11 => 7,
        _ => unreachable!("two-bit tag"),
    };

    for _ in 0..extra_bytes {
        value = (value << 8) | u64::from(cursor.read_u8()?);
    }

    Ok(value)
}

/// Writes `value` as the shortest QUIC variable-length integer that fits.
///
/// # Errors
///
/// Returns an error if `value` exceeds [`MAX_VARINT`].
pub fn write_varint(buf: &mut Vec<u8>, value: u64) -> io::Result<()> {
    if value <= 0x3f {
        buf.write_u8(value as u8)
    } else if value <= 0x3fff {
        buf.write_u16::<BigEndian>(0b01 << 14 | value as u16)
    } else if value <= 0x3fff_ffff {
        buf.write_u32::<BigEndian>(0b10 << 30 | value as u32)
    } else if value <= MAX_VARINT {
        buf.write_u64::<BigEndian>(0b11 << 62 | value)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{value} does not fit in a QUIC variable-length integer"),
        ))
    }
}

/// The number of bytes [`write_varint`] would emit for `value`.
///
/// # Panics
///
/// Panics if `value` exceeds [`MAX_VARINT`] — callers are expected to have
/// already validated the value, mirroring the rest of the codec's
/// `length()`-must-match-`encode()`-output invariant.
#[must_use]
pub fn varint_len(value: u64) -> usize {
    if value <= 0x3f {
        1
    } else if value <= 0x3fff {
        2
    } else if value <= 0x3fff_ffff {
        4
    } else if value <= MAX_VARINT {
        8
    } else {
        panic!("{value} does not fit in a QUIC variable-length integer");
    }
}

/// Reads `len` raw bytes from the cursor into a fresh `Vec`.
pub fn read_vec(cursor: &mut Cursor<&[u8]>, len: u64) -> io::Result<Vec<u8>> {
    let mut vec = vec![0_u8; usize::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidData, "length does not fit in usize")
    })?];
    cursor.read_exact(&mut vec)?;
    Ok(vec)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_the_four_rfc9000_examples() {
        // the four worked examples from RFC 9000 Appendix A.1
        let cases: &[(&[u8], u64)] = &[
            (&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c], 151_288_809_941_952_652),
            (&[0x9d, 0x7f, 0x3e, 0x7d], 494_878_333),
            (&[0x7b, 0xbd], 15_293),
            (&[0x25], 37),
            (&[0x40, 0x25], 37),
        ];

        for (bytes, expected) in cases {
            let mut cursor = Cursor::new(*bytes);
            assert_eq!(read_varint(&mut cursor).unwrap(), *expected);
        }
    }

    #[test]
    fn round_trips_shortest_form() {
        for value in [0, 1, 0x3f, 0x40, 0x3fff, 0x4000, 0x3fff_ffff, 0x4000_0000, MAX_VARINT] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value).unwrap();
            assert_eq!(buf.len(), varint_len(value));

            let mut cursor = Cursor::new(&buf[..]);
            assert_eq!(read_varint(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn rejects_values_that_overflow_62_bits() {
        let mut buf = Vec::new();
        assert!(write_varint(&mut buf, MAX_VARINT + 1).is_err());
    }
}
