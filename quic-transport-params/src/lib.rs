//! The QUIC `transport_parameters` codec — RFC 9000 §18 and the
//! `quic_transport_parameters` TLS extension of RFC 9001 §8.2.
//!
//! A transport parameters block is a sequence of `(id: varint, length:
//! varint, value: opaque)` triples. Parameters with an id this crate
//! doesn't recognise are preserved as [`TransportParameter::Unknown`] so
//! they round-trip through inspection but, per the GREASE convention, are
//! never re-synthesised by an encoder that didn't originally read them.

use std::io::{self, Cursor, Read};

use byteorder::ReadBytesExt;
use serde::{Deserialize, Serialize};

mod cursor_ext;
mod serde_with_base64;
pub mod varint;

use cursor_ext::{CursorExt, ReadFromCursor};
use varint::{read_varint, read_vec, varint_len, write_varint};

/// A fully decoded `transport_parameters` extension body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransportParameters {
    params: Vec<TransportParameter>,
}

impl TransportParameters {
    #[must_use]
    pub fn params(&self) -> &[TransportParameter] {
        &self.params
    }

    pub fn push(&mut self, param: TransportParameter) {
        self.params.push(param);
    }

    /// Decodes a complete `transport_parameters` body (no outer length
    /// prefix — the caller already knows where the body ends, matching
    /// how the `quic_transport_parameters` TLS extension is framed).
    pub fn decode(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut params = Vec::new();
        while !cursor.std_remaining_slice().is_empty() {
            params.push(TransportParameter::read_from(&mut cursor)?);
        }
        Ok(Self { params })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for param in &self.params {
            param.encode_into(&mut out);
        }
        out
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.params.iter().map(TransportParameter::length).sum()
    }
}

impl From<Vec<TransportParameter>> for TransportParameters {
    fn from(params: Vec<TransportParameter>) -> Self {
        Self { params }
    }
}

macro_rules! varint_params {
    ($($id:literal => $variant:ident,)+) => {
        /// A single decoded transport parameter.
        #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
        pub enum TransportParameter {
            $(
                $variant(u64),
            )+

            /// `stateless_reset_token` (id 0x02) — always exactly 16 bytes.
            StatelessResetToken([u8; 16]),

            /// `disable_active_migration` (id 0x0c) — zero-length presence flag.
            DisableActiveMigration,

            /// `original_destination_connection_id` (id 0x00).
            OriginalDestinationConnectionId(ConnectionIdBytes),

            /// `initial_source_connection_id` (id 0x0f).
            InitialSourceConnectionId(ConnectionIdBytes),

            /// `retry_source_connection_id` (id 0x10).
            RetrySourceConnectionId(ConnectionIdBytes),

            /// An id this crate doesn't parse further, preserved verbatim so
            /// GREASE parameters and forward-compatible extensions round-trip
            /// through inspection.
            Unknown { id: u64, value: ConnectionIdBytes },
        }

        impl TransportParameter {
            fn id(&self) -> u64 {
                match self {
                    $(Self::$variant(_) => $id,)+
                    Self::StatelessResetToken(_) => 0x02,
                    Self::DisableActiveMigration => 0x0c,
                    Self::OriginalDestinationConnectionId(_) => 0x00,
                    Self::InitialSourceConnectionId(_) => 0x0f,
                    Self::RetrySourceConnectionId(_) => 0x10,
                    Self::Unknown { id, .. } => *id,
                }
            }

            fn value_len(&self) -> usize {
                match self {
                    $(Self::$variant(v) => varint_len(*v),)+
                    Self::StatelessResetToken(_) => 16,
                    Self::DisableActiveMigration => 0,
                    Self::OriginalDestinationConnectionId(b)
                    | Self::InitialSourceConnectionId(b)
                    | Self::RetrySourceConnectionId(b) => b.0.len(),
                    Self::Unknown { value, .. } => value.0.len(),
                }
            }

            fn encode_value(&self, out: &mut Vec<u8>) {
                match self {
                    $(Self::$variant(v) => write_varint(out, *v).unwrap(),)+
                    Self::StatelessResetToken(token) => out.extend_from_slice(token),
                    Self::DisableActiveMigration => {}
                    Self::OriginalDestinationConnectionId(b)
                    | Self::InitialSourceConnectionId(b)
                    | Self::RetrySourceConnectionId(b) => out.extend_from_slice(&b.0),
                    Self::Unknown { value, .. } => out.extend_from_slice(&value.0),
                }
            }

            fn decode_known(id: u64, cursor: &mut Cursor<&[u8]>, len: u64) -> io::Result<Option<Self>> {
                Ok(Some(match id {
                    $($id => Self::$variant(read_varint(cursor)?),)+
                    0x02 => {
                        let mut token = [0u8; 16];
                        cursor.read_exact(&mut token)?;
                        Self::StatelessResetToken(token)
                    }
                    0x0c => Self::DisableActiveMigration,
                    0x00 => Self::OriginalDestinationConnectionId(ConnectionIdBytes(read_vec(cursor, len)?)),
                    0x0f => Self::InitialSourceConnectionId(ConnectionIdBytes(read_vec(cursor, len)?)),
                    0x10 => Self::RetrySourceConnectionId(ConnectionIdBytes(read_vec(cursor, len)?)),
                    _ => return Ok(None),
                }))
            }
        }
    }
}

varint_params! {
    0x01 => MaxIdleTimeout,
    0x03 => MaxUdpPayloadSize,
    0x04 => InitialMaxData,
    0x05 => InitialMaxStreamDataBidiLocal,
    0x06 => InitialMaxStreamDataBidiRemote,
    0x07 => InitialMaxStreamDataUni,
    0x08 => InitialMaxStreamsBidi,
    0x09 => InitialMaxStreamsUni,
    0x0a => AckDelayExponent,
    0x0b => MaxAckDelay,
    0x0e => ActiveConnectionIdLimit,
}

impl TransportParameter {
    #[must_use]
    pub fn length(&self) -> usize {
        varint_len(self.id()) + varint_len(self.value_len() as u64) + self.value_len()
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        write_varint(out, self.id()).unwrap();
        write_varint(out, self.value_len() as u64).unwrap();
        self.encode_value(out);
    }
}

impl ReadFromCursor for TransportParameter {
    fn read_from(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let id = read_varint(cursor)?;
        let len = read_varint(cursor)?;
        log::trace!("transport parameter id={id:#x} len={len}");

        cursor.with_truncated(len, |cursor, _len_hint| -> io::Result<Self> {
            if let Some(known) = Self::decode_known(id, cursor, len)? {
                return Ok(known);
            }
            let value = ConnectionIdBytes(read_vec(cursor, len)?);
            Ok(Self::Unknown { id, value })
        })
    }
}

/// A short opaque byte string, used both for connection ids (RFC 9000 caps
/// these at 20 bytes) and for the bodies of unrecognised parameters.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionIdBytes(#[serde_as(as = "serde_with_base64::Base64")] pub Vec<u8>);

/// Returns true if `id` is a GREASE codepoint per RFC 9000 §18.1: `31 * n + 27`
/// for some non-negative integer `n`, all of which fit in 62 bits for any
/// `n` reachable by a real implementation.
#[must_use]
pub fn is_grease_id(id: u64) -> bool {
    id >= 27 && (id - 27) % 31 == 0
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_known_and_unknown_parameters() {
        let params = TransportParameters::from(vec![
            TransportParameter::InitialMaxData(1_048_576),
            TransportParameter::DisableActiveMigration,
            TransportParameter::InitialSourceConnectionId(ConnectionIdBytes(vec![1, 2, 3, 4])),
            TransportParameter::Unknown { id: 27, value: ConnectionIdBytes(vec![0xaa, 0xbb]) },
        ]);

        let encoded = params.encode();
        assert_eq!(encoded.len(), params.length());

        let decoded = TransportParameters::decode(&encoded).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn recognises_grease_ids() {
        assert!(is_grease_id(27));
        assert!(is_grease_id(27 + 31));
        assert!(!is_grease_id(0x04));
    }

    #[test]
    fn decodes_a_minimal_client_parameters_block() {
        let buf = &[
            0x04, 0x04, 0x80, 0x10, 0x00, 0x00, // initial_max_data = 0x100000 (4-byte varint)
            0x0c, 0x00, // disable_active_migration
        ];
        let decoded = TransportParameters::decode(buf).unwrap();
        assert_eq!(
            decoded.params(),
            &[
                TransportParameter::InitialMaxData(0x0010_0000),
                TransportParameter::DisableActiveMigration,
            ]
        );
    }
}
