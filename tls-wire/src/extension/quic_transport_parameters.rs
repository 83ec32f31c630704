//! `quic_transport_parameters` — [RFC 9001 §8.2](https://datatracker.ietf.org/doc/html/rfc9001#section-8.2).
//! The body is the same `(id, length, value)` VLI-triple sequence the
//! standalone `quic-transport-params` crate codes, so this module is a
//! thin wrapper rather than a second implementation of that wire format.

use quic_transport_params::TransportParameters;

use crate::codec::Reader;
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct QuicTransportParametersExt(pub TransportParameters);

impl QuicTransportParametersExt {
    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let remaining = &c.get_ref()[c.position() as usize..];
        let params = TransportParameters::decode(remaining)
            .map_err(|_| CodecError::InvalidValue { field: "quic_transport_parameters", value: 0 })?;
        // the whole remainder of the extension body belongs to this codec
        c.set_position(c.get_ref().len() as u64);
        Ok(Self(params))
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.encode());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use quic_transport_params::TransportParameter;

    #[test]
    fn round_trips_through_the_extension_wrapper() {
        let params = TransportParameters::from(vec![TransportParameter::InitialMaxData(1024)]);
        let ext = QuicTransportParametersExt(params);
        let mut buf = Vec::new();
        ext.write_to(&mut buf);
        assert_eq!(QuicTransportParametersExt::read_from(&mut Reader::new(&buf)).unwrap(), ext);
    }
}
