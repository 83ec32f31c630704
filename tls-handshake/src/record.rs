//! The record layer: `TLSPlaintext`/`TLSCiphertext` framing
//! over a `Read + Write` transport, handshake-message fragmentation and
//! reassembly, the `ChangeCipherSpec` compatibility filter, AEAD nonce
//! construction, and sequence-number bookkeeping.
//!
//! This module owns every byte that crosses the wire once a connection is
//! established; `tls-wire::record` only knows the frame shapes, not what
//! to do with them.

use std::io::{Read, Write};

use tls_crypto::provider::Aead;
use tls_wire::handshake::LEGACY_VERSION;
use tls_wire::record::{TlsCiphertext, TlsPlaintext, MAX_CIPHERTEXT_FRAGMENT_LEN, MAX_PLAINTEXT_FRAGMENT_LEN};
use tls_wire::ContentType;

use crate::alert::Alert;
use crate::error::{HandshakeError, Result};

/// One direction's live key material: RFC 8446 §5.3's nonce construction
/// is "pad the sequence number to the IV's length, then XOR it into the
/// static IV" — sequence numbers reset to zero on every key change and
/// are never transmitted.
struct DirectionKeys {
    key: Vec<u8>,
    iv: Vec<u8>,
    seq: u64,
}

impl DirectionKeys {
    fn new(key: Vec<u8>, iv: Vec<u8>) -> Self {
        Self { key, iv, seq: 0 }
    }

    fn next_nonce(&mut self) -> Result<Vec<u8>> {
        if self.seq == u64::MAX {
            return Err(HandshakeError::SequenceNumberOverflow);
        }
        let mut nonce = self.iv.clone();
        let seq_bytes = self.seq.to_be_bytes();
        let offset = nonce.len() - seq_bytes.len();
        for (n, s) in nonce[offset..].iter_mut().zip(seq_bytes.iter()) {
            *n ^= s;
        }
        self.seq += 1;
        Ok(nonce)
    }
}

/// A fully decoded inbound record-layer event. `ChangeCipherSpec` never
/// reaches this enum — it's filtered out silently inside [`RecordLayer::recv_next`],
/// per RFC 8446 §5.
pub enum Incoming {
    /// The raw bytes (1-byte type + 3-byte length + body) of exactly one
    /// handshake message. The caller decodes it with
    /// `HandshakeMessage::read_from` once it knows the negotiated hash's
    /// output length (needed to bound a `Finished` message).
    Handshake(Vec<u8>),
    ApplicationData(Vec<u8>),
    Alert(Alert),
}

/// Drives `TLSPlaintext`/`TLSCiphertext` framing over a transport. Holds at
/// most one read key and one write key at a time; the handshake layer
/// calls [`set_write_keys`](Self::set_write_keys)/[`set_read_keys`](Self::set_read_keys)
/// at each key-schedule transition, each call resetting that
/// direction's sequence number to zero.
pub struct RecordLayer<T> {
    transport: T,
    aead: Option<Box<dyn Aead>>,
    write_keys: Option<DirectionKeys>,
    read_keys: Option<DirectionKeys>,
    peer_record_size_limit: usize,
    reassembly: Vec<u8>,
    sent_compat_ccs: bool,
}

impl<T: Read + Write> RecordLayer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            aead: None,
            write_keys: None,
            read_keys: None,
            peer_record_size_limit: MAX_PLAINTEXT_FRAGMENT_LEN,
            reassembly: Vec::new(),
            sent_compat_ccs: false,
        }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Installs the AEAD for the negotiated cipher suite. Must be called
    /// once, as soon as the cipher suite is known (i.e. right after
    /// ServerHello on both sides), before any key is installed.
    pub fn install_aead(&mut self, aead: Box<dyn Aead>) {
        self.aead = Some(aead);
    }

    pub fn set_write_keys(&mut self, key: Vec<u8>, iv: Vec<u8>) {
        self.write_keys = Some(DirectionKeys::new(key, iv));
    }

    pub fn set_read_keys(&mut self, key: Vec<u8>, iv: Vec<u8>) {
        self.read_keys = Some(DirectionKeys::new(key, iv));
    }

    pub fn clear_write_keys(&mut self) {
        self.write_keys = None;
    }

    pub fn clear_read_keys(&mut self) {
        self.read_keys = None;
    }

    pub fn set_peer_record_size_limit(&mut self, limit: usize) {
        self.peer_record_size_limit = limit.min(MAX_PLAINTEXT_FRAGMENT_LEN);
    }

    fn plaintext_fragment_budget(&self) -> usize {
        self.peer_record_size_limit.min(MAX_PLAINTEXT_FRAGMENT_LEN)
    }

    /// Sends the single `{0x01}` `ChangeCipherSpec` compatibility record,
    /// at most once per connection. A no-op after the
    /// first call, so callers can invoke it unconditionally at the usual
    /// point (right before the first handshake-protected flight).
    pub fn send_compat_change_cipher_spec(&mut self) -> Result<()> {
        if self.sent_compat_ccs {
            return Ok(());
        }
        self.sent_compat_ccs = true;
        let record = TlsPlaintext::new(ContentType::ChangeCipherSpec, vec![0x01]);
        let mut buf = Vec::new();
        record.write_to(&mut buf)?;
        self.transport.write_all(&buf)?;
        Ok(())
    }

    fn write_one_fragment(&mut self, content_type: ContentType, fragment: &[u8]) -> Result<()> {
        let mut buf = Vec::new();
        match (&self.aead, &mut self.write_keys) {
            (Some(aead), Some(keys)) => {
                let mut plaintext = fragment.to_vec();
                plaintext.push(u8::from(content_type));
                let sealed_len = (plaintext.len() + aead.tag_len()) as u16;
                let aad = TlsPlaintext::header_bytes(ContentType::ApplicationData, LEGACY_VERSION, sealed_len);
                let nonce = keys.next_nonce()?;
                aead.seal(&keys.key, &nonce, &aad, &mut plaintext)?;
                TlsCiphertext::new(plaintext).write_to(&mut buf)?;
            }
            _ => {
                TlsPlaintext::new(content_type, fragment.to_vec()).write_to(&mut buf)?;
            }
        }
        self.transport.write_all(&buf)?;
        Ok(())
    }

    fn write_fragmented(&mut self, content_type: ContentType, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return self.write_one_fragment(content_type, data);
        }
        let budget = self.plaintext_fragment_budget();
        for chunk in data.chunks(budget.max(1)) {
            self.write_one_fragment(content_type, chunk)?;
        }
        Ok(())
    }

    pub fn write_handshake(&mut self, message_bytes: &[u8]) -> Result<()> {
        self.write_fragmented(ContentType::Handshake, message_bytes)
    }

    pub fn write_application_data(&mut self, data: &[u8]) -> Result<()> {
        self.write_fragmented(ContentType::ApplicationData, data)
    }

    pub fn write_alert(&mut self, alert: Alert) -> Result<()> {
        let mut body = Vec::new();
        alert.write_to(&mut body)?;
        self.write_one_fragment(ContentType::Alert, &body)
    }

    /// Reads and decrypts exactly one underlying TLS record, silently
    /// dropping `ChangeCipherSpec` records per RFC 8446 §5's compatibility
    /// note ("the receiver MUST ignore it"). Handshake-content records are appended to the
    /// reassembly buffer and not surfaced to the caller until
    /// [`take_handshake_message`](Self::take_handshake_message) can pull a
    /// complete message out of it, since handshake messages may span or
    /// share records.
    fn recv_one_record(&mut self) -> Result<Option<Incoming>> {
        let mut header = [0_u8; 5];
        self.transport.read_exact(&mut header)?;
        let declared_len = u16::from_be_bytes([header[3], header[4]]) as usize;
        let mut body = vec![0_u8; declared_len];
        self.transport.read_exact(&mut body)?;

        if header[0] == u8::from(ContentType::ChangeCipherSpec) {
            return Ok(None);
        }

        let mut full = Vec::with_capacity(5 + declared_len);
        full.extend_from_slice(&header);
        full.extend_from_slice(&body);
        let mut cursor = tls_wire::codec::Reader::new(&full);

        let (content_type, plaintext) = match (&self.aead, &mut self.read_keys) {
            (Some(aead), Some(keys)) => {
                let mut record = TlsCiphertext::read_from(&mut cursor)?;
                if record.fragment.len() > MAX_CIPHERTEXT_FRAGMENT_LEN {
                    return Err(HandshakeError::WireDecode(tls_wire::CodecError::Overlong {
                        stated_length: record.fragment.len(),
                        available: MAX_CIPHERTEXT_FRAGMENT_LEN,
                    }));
                }
                let aad = record.additional_data();
                let nonce = keys.next_nonce()?;
                let opened = aead.open(&keys.key, &nonce, &aad, &mut record.fragment)?;

                let mut end = opened.len();
                while end > 0 && opened[end - 1] == 0 {
                    end -= 1;
                }
                if end == 0 {
                    return Err(HandshakeError::AeadOpenFailure);
                }
                let content_type = ContentType::try_from(opened[end - 1])?;
                (content_type, opened[..end - 1].to_vec())
            }
            _ => {
                let record = TlsPlaintext::read_from(&mut cursor)?;
                (record.content_type, record.fragment)
            }
        };

        match content_type {
            ContentType::ChangeCipherSpec => Ok(None),
            ContentType::Handshake => {
                self.reassembly.extend_from_slice(&plaintext);
                Ok(None)
            }
            ContentType::ApplicationData => Ok(Some(Incoming::ApplicationData(plaintext))),
            ContentType::Alert => {
                let mut c = tls_wire::codec::Reader::new(&plaintext);
                Ok(Some(Incoming::Alert(Alert::read_from(&mut c)?)))
            }
        }
    }

    /// The byte length of one fully-buffered handshake message sitting at
    /// the front of the reassembly buffer, if any: a 1-byte type + 3-byte
    /// length header plus however many body bytes it declares.
    fn complete_message_len(&self) -> Option<usize> {
        if self.reassembly.len() < 4 {
            return None;
        }
        let body_len = u32::from_be_bytes([0, self.reassembly[1], self.reassembly[2], self.reassembly[3]]) as usize;
        let total = 4 + body_len;
        (self.reassembly.len() >= total).then_some(total)
    }

    /// Reads records until at least one complete handshake message, one
    /// application-data record, or one alert is available, then returns
    /// it. Handshake messages are returned whole (never partially) even
    /// if they arrived split across several records, and a handshake
    /// message already complete in the reassembly buffer is drained
    /// before any further I/O.
    pub fn recv_next(&mut self) -> Result<Incoming> {
        loop {
            if let Some(len) = self.complete_message_len() {
                let message = self.reassembly.drain(..len).collect();
                return Ok(Incoming::Handshake(message));
            }
            if let Some(event) = self.recv_one_record()? {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn plaintext_record(content_type: ContentType, fragment: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        TlsPlaintext::new(content_type, fragment.to_vec()).write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn change_cipher_spec_is_silently_dropped_and_never_surfaced() {
        let mut wire = Vec::new();
        wire.extend(plaintext_record(ContentType::ChangeCipherSpec, &[0x01]));
        wire.extend(plaintext_record(ContentType::Handshake, &[0, 0, 0, 2, 0xaa, 0xbb]));

        let mut record = RecordLayer::new(Cursor::new(wire));
        match record.recv_next().unwrap() {
            Incoming::Handshake(bytes) => assert_eq!(bytes, vec![0, 0, 0, 2, 0xaa, 0xbb]),
            _ => panic!("expected the handshake record, with the CCS record skipped over"),
        }
    }

    #[test]
    fn sequence_number_starts_at_zero_and_increments_once_per_record() {
        let mut keys = DirectionKeys::new(vec![0; 16], vec![0; 12]);
        let first = keys.next_nonce().unwrap();
        let second = keys.next_nonce().unwrap();
        assert_eq!(first, vec![0; 12]);
        assert_ne!(first, second);
        assert_eq!(keys.seq, 2);
    }

    #[test]
    fn sequence_number_resets_to_zero_on_key_change() {
        let mut record = RecordLayer::new(Cursor::new(Vec::new()));
        record.install_aead(tls_crypto::params_for(tls_wire::CipherSuite::Aes128GcmSha256).unwrap().aead);
        record.set_write_keys(vec![0; 16], vec![0; 12]);
        record.write_application_data(b"one").unwrap();
        assert_eq!(record.write_keys.as_ref().unwrap().seq, 1);

        record.set_write_keys(vec![1; 16], vec![1; 12]);
        assert_eq!(record.write_keys.as_ref().unwrap().seq, 0);
    }

    #[test]
    fn next_nonce_refuses_to_wrap_the_sequence_number() {
        let mut keys = DirectionKeys::new(vec![0; 16], vec![0; 12]);
        keys.seq = u64::MAX;
        assert!(matches!(keys.next_nonce(), Err(HandshakeError::SequenceNumberOverflow)));
    }
}
