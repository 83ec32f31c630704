//! `psk_key_exchange_modes` — [RFC 8446 §4.2.9](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.9).
//! Sent only by the client, declaring which PSK modes it is willing to use.
//! This crate only ever offers and accepts `psk_dhe_ke` (0x01) — the
//! PSK-only mode (`psk_ke`, 0x00) still round-trips for inspection but is
//! never selected, since every handshake this crate drives also performs
//! an ECDHE exchange.

use crate::codec::{read_opaque, read_u8, write_opaque, write_u8, LengthPrefix, Reader};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PskKeyExchangeMode {
    PskKe,
    PskDheKe,
    Unknown(u8),
}

impl From<u8> for PskKeyExchangeMode {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::PskKe,
            1 => Self::PskDheKe,
            other => Self::Unknown(other),
        }
    }
}

impl From<PskKeyExchangeMode> for u8 {
    fn from(m: PskKeyExchangeMode) -> Self {
        match m {
            PskKeyExchangeMode::PskKe => 0,
            PskKeyExchangeMode::PskDheKe => 1,
            PskKeyExchangeMode::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskKeyExchangeModes {
    pub modes: Vec<PskKeyExchangeMode>,
}

impl PskKeyExchangeModes {
    #[must_use]
    pub fn psk_dhe_ke_only() -> Self {
        Self { modes: vec![PskKeyExchangeMode::PskDheKe] }
    }

    #[must_use]
    pub fn offers_psk_dhe_ke(&self) -> bool {
        self.modes.iter().any(|m| matches!(m, PskKeyExchangeMode::PskDheKe))
    }

    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let bytes = read_opaque(c, LengthPrefix::U8)?;
        Ok(Self { modes: bytes.into_iter().map(PskKeyExchangeMode::from).collect() })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for mode in &self.modes {
            write_u8(&mut list, u8::from(*mode));
        }
        write_opaque(out, LengthPrefix::U8, &list).unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips() {
        let modes = PskKeyExchangeModes::psk_dhe_ke_only();
        let mut buf = Vec::new();
        modes.write_to(&mut buf);
        assert_eq!(PskKeyExchangeModes::read_from(&mut Reader::new(&buf)).unwrap(), modes);
        assert!(modes.offers_psk_dhe_ke());
    }
}
