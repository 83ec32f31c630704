//! The rolling transcript hash (RFC 8446 §4.4.1) and the PSK-binder
//! snapshot technique used to compute binders before they themselves
//! enter the transcript.

use tls_wire::HandshakeType;

use crate::provider::{Hash, HashContext};

/// An incrementally-hashed record of every handshake message sent and
/// received so far, keyed to whichever cipher suite's hash this connection
/// negotiated. The record layer feeds every handshake message's bytes
/// (header included) through `append` in order; `current_hash` is what
/// `Finished`, `CertificateVerify`, and every `DeriveSecret` call consume.
pub struct TranscriptHash {
    hash: Box<dyn Hash>,
    context: Box<dyn HashContext>,
}

impl TranscriptHash {
    #[must_use]
    pub fn new(hash: Box<dyn Hash>) -> Self {
        let context = hash.new_context();
        Self { hash, context }
    }

    pub fn append(&mut self, handshake_message_bytes: &[u8]) {
        self.context.update(handshake_message_bytes);
    }

    /// Restarts the transcript as a synthetic `message_hash` handshake
    /// message carrying `Hash(ClientHello1)`, per RFC 8446 §4.4.1 — called
    /// exactly once, right after a HelloRetryRequest is sent or received,
    /// before ClientHello1's bytes are discarded from memory.
    pub fn replace_with_message_hash(&mut self) {
        let digest = self.context.clone_box().finish();

        let mut synthetic = Vec::with_capacity(4 + digest.len());
        synthetic.push(u8::from(HandshakeType::MessageHash));
        let len = digest.len() as u32;
        synthetic.extend_from_slice(&len.to_be_bytes()[1..]);
        synthetic.extend_from_slice(&digest);

        self.context = self.hash.new_context();
        self.context.update(&synthetic);
    }

    #[must_use]
    pub fn current_hash(&self) -> Vec<u8> {
        self.context.clone_box().finish()
    }

    /// Hashes `extra` onto a clone of the current transcript without
    /// touching the real one. Used to compute a PSK binder: the binder is
    /// an HMAC over `Hash(truncated ClientHello, stopping right before the
    /// binders list)`, but the real transcript only gets the *complete*
    /// ClientHello (binders included) appended once every binder has been
    /// computed.
    #[must_use]
    pub fn snapshot_with_extra(&self, extra: &[u8]) -> Vec<u8> {
        let mut cloned = self.context.clone_box();
        cloned.update(extra);
        cloned.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FakeHash;
    struct FakeHashContext(Vec<u8>);

    impl Hash for FakeHash {
        fn output_len(&self) -> usize {
            4
        }
        fn digest(&self, data: &[u8]) -> Vec<u8> {
            data.iter().fold(0_u32, |acc, b| acc.wrapping_add(u32::from(*b))).to_be_bytes().to_vec()
        }
        fn new_context(&self) -> Box<dyn HashContext> {
            Box::new(FakeHashContext(Vec::new()))
        }
    }

    impl HashContext for FakeHashContext {
        fn update(&mut self, data: &[u8]) {
            self.0.extend_from_slice(data);
        }
        fn finish(self: Box<Self>) -> Vec<u8> {
            FakeHash.digest(&self.0)
        }
        fn clone_box(&self) -> Box<dyn HashContext> {
            Box::new(FakeHashContext(self.0.clone()))
        }
    }

    #[test]
    fn snapshot_does_not_mutate_real_transcript() {
        let mut t = TranscriptHash::new(Box::new(FakeHash));
        t.append(b"client-hello-bytes");
        let before = t.current_hash();
        let snapshot = t.snapshot_with_extra(b"partial-binder-tail");
        assert_ne!(snapshot, before);
        assert_eq!(t.current_hash(), before);
    }

    #[test]
    fn message_hash_substitution_changes_subsequent_hash() {
        let mut a = TranscriptHash::new(Box::new(FakeHash));
        a.append(b"client-hello-1");

        let mut b = TranscriptHash::new(Box::new(FakeHash));
        b.append(b"client-hello-1");
        b.replace_with_message_hash();

        // after substitution the running context holds a type+length+digest
        // synthetic message, not the raw bytes, so continuing the
        // transcript diverges from simply appending more raw bytes.
        a.append(b"hello-retry-request");
        b.append(b"hello-retry-request");
        assert_ne!(a.current_hash(), b.current_hash());
    }
}
