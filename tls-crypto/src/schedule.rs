//! The TLS 1.3 key schedule (RFC 8446 §7.1): `HKDF-Expand-Label`,
//! `Derive-Secret`, and the Extract/Derive ladder from the early secret
//! down through the resumption master secret.

use crate::error::Result;
use crate::provider::Hkdf;

/// Builds the `HkdfLabel` structure RFC 8446 §7.1 feeds as the `info`
/// parameter to HKDF-Expand:
/// ```text
/// struct {
///     uint16 length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
fn build_hkdf_label(length: u16, label: &[u8], context: &[u8]) -> Vec<u8> {
    let mut full_label = Vec::with_capacity(6 + label.len());
    full_label.extend_from_slice(b"tls13 ");
    full_label.extend_from_slice(label);

    let mut out = Vec::with_capacity(2 + 1 + full_label.len() + 1 + context.len());
    out.extend_from_slice(&length.to_be_bytes());
    out.push(full_label.len() as u8);
    out.extend_from_slice(&full_label);
    out.push(context.len() as u8);
    out.extend_from_slice(context);
    out
}

pub fn hkdf_expand_label(hkdf: &dyn Hkdf, secret: &[u8], label: &[u8], context: &[u8], length: usize) -> Result<Vec<u8>> {
    let info = build_hkdf_label(length as u16, label, context);
    hkdf.expand(secret, &info, length)
}

/// `Derive-Secret(Secret, Label, Messages) = HKDF-Expand-Label(Secret,
/// Label, Transcript-Hash(Messages), Hash.length)`.
pub fn derive_secret(hkdf: &dyn Hkdf, secret: &[u8], label: &[u8], transcript_hash: &[u8]) -> Result<Vec<u8>> {
    hkdf_expand_label(hkdf, secret, label, transcript_hash, hkdf.hash().output_len())
}

/// RFC 8446 §4.6.1: the actual PSK offered in a resumption handshake is
/// never the raw `resumption_master_secret` a `NewSessionTicket` handed
/// out — it's that secret expanded with the ticket's own nonce as the
/// label context, so two tickets issued off the same connection still
/// yield independent PSKs: `HKDF-Expand-Label(resumption_master_secret,
/// "resumption", ticket_nonce, Hash.length)`.
pub fn resumption_psk(hkdf: &dyn Hkdf, resumption_master_secret: &[u8], ticket_nonce: &[u8]) -> Result<Vec<u8>> {
    hkdf_expand_label(hkdf, resumption_master_secret, b"resumption", ticket_nonce, hkdf.hash().output_len())
}

/// RFC 8446 §4.4.4: `verify_data = HMAC(finished_key, Transcript-Hash(...))`.
/// The PSK binder (§4.2.11.2) is computed the same way, over a binder key
/// in place of a `c hs traffic`/`s hs traffic` finished key. `Hkdf::extract`
/// is exactly `HMAC-Hash(salt, ikm)` with `salt` as the MAC key, so this is
/// a thin, differently-named entry point rather than new primitive code.
pub fn finished_mac(hkdf: &dyn Hkdf, finished_key: &[u8], transcript_hash: &[u8]) -> Vec<u8> {
    hkdf.extract(finished_key, transcript_hash)
}

/// Walks the Extract/Derive ladder of RFC 8446 §7.1, holding whichever
/// secrets have been derived so far. Every accessor takes the transcript
/// hash it needs as an argument rather than owning a `TranscriptHash`
/// itself — the handshake layer decides exactly which point in the
/// transcript each secret is derived at (e.g. client/server handshake
/// traffic secrets use the transcript through ServerHello, not through
/// Finished).
pub struct KeySchedule {
    hkdf: Box<dyn Hkdf>,
    early_secret: Vec<u8>,
    handshake_secret: Vec<u8>,
    master_secret: Vec<u8>,
}

impl KeySchedule {
    /// Starts the ladder. `psk` is `None` for a full (non-resumed)
    /// handshake, in which case the early secret is extracted from an
    /// all-zero IKM of the hash's length, per RFC 8446 §7.1.
    #[must_use]
    pub fn new(hkdf: Box<dyn Hkdf>, psk: Option<&[u8]>) -> Self {
        let zeros = vec![0_u8; hkdf.hash().output_len()];
        let ikm = psk.unwrap_or(&zeros);
        let early_secret = hkdf.extract(&[], ikm);
        Self { hkdf, early_secret, handshake_secret: Vec::new(), master_secret: Vec::new() }
    }

    #[must_use]
    pub fn hkdf(&self) -> &dyn Hkdf {
        &*self.hkdf
    }

    pub fn binder_key_external(&self) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.early_secret, b"ext binder", &self.empty_hash())
    }

    pub fn binder_key_resumption(&self) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.early_secret, b"res binder", &self.empty_hash())
    }

    pub fn client_early_traffic_secret(&self, transcript_through_client_hello: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.early_secret, b"c e traffic", transcript_through_client_hello)
    }

    pub fn early_exporter_master_secret(&self, transcript_through_client_hello: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.early_secret, b"e exp master", transcript_through_client_hello)
    }

    /// Folds the (EC)DHE shared secret in, producing the handshake secret.
    /// Must be called once, after the early secret stage and before any
    /// handshake traffic secret is read.
    pub fn derive_handshake_secret(&mut self, dhe_shared_secret: &[u8]) -> Result<()> {
        let derived = derive_secret(&*self.hkdf, &self.early_secret, b"derived", &self.empty_hash())?;
        self.handshake_secret = self.hkdf.extract(&derived, dhe_shared_secret);
        Ok(())
    }

    pub fn client_handshake_traffic_secret(&self, transcript_through_server_hello: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.handshake_secret, b"c hs traffic", transcript_through_server_hello)
    }

    pub fn server_handshake_traffic_secret(&self, transcript_through_server_hello: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.handshake_secret, b"s hs traffic", transcript_through_server_hello)
    }

    /// Zeroes out the DHE contribution and folds the handshake secret
    /// forward into the master secret. Must be called once, after the
    /// handshake secret stage and before any application traffic secret is
    /// read.
    pub fn derive_master_secret(&mut self) -> Result<()> {
        let derived = derive_secret(&*self.hkdf, &self.handshake_secret, b"derived", &self.empty_hash())?;
        let zeros = vec![0_u8; self.hkdf.hash().output_len()];
        self.master_secret = self.hkdf.extract(&derived, &zeros);
        Ok(())
    }

    pub fn client_application_traffic_secret_0(&self, transcript_through_server_finished: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.master_secret, b"c ap traffic", transcript_through_server_finished)
    }

    pub fn server_application_traffic_secret_0(&self, transcript_through_server_finished: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.master_secret, b"s ap traffic", transcript_through_server_finished)
    }

    pub fn exporter_master_secret(&self, transcript_through_server_finished: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.master_secret, b"exp master", transcript_through_server_finished)
    }

    pub fn resumption_master_secret(&self, transcript_through_client_finished: &[u8]) -> Result<Vec<u8>> {
        derive_secret(&*self.hkdf, &self.master_secret, b"res master", transcript_through_client_finished)
    }

    /// `finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)`.
    pub fn finished_key(&self, base_key: &[u8]) -> Result<Vec<u8>> {
        hkdf_expand_label(&*self.hkdf, base_key, b"finished", &[], self.hkdf.hash().output_len())
    }

    /// Derives the record-layer key and IV from a traffic secret
    /// (RFC 8446 §7.3).
    pub fn traffic_key_and_iv(&self, traffic_secret: &[u8], key_len: usize, iv_len: usize) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = hkdf_expand_label(&*self.hkdf, traffic_secret, b"key", &[], key_len)?;
        let iv = hkdf_expand_label(&*self.hkdf, traffic_secret, b"iv", &[], iv_len)?;
        Ok((key, iv))
    }

    /// `KeyUpdate`'s traffic secret ratchet (RFC 8446 §7.2):
    /// `application_traffic_secret_N+1 = HKDF-Expand-Label(
    ///      application_traffic_secret_N, "traffic upd", "", Hash.length)`.
    pub fn next_traffic_secret(&self, current: &[u8]) -> Result<Vec<u8>> {
        hkdf_expand_label(&*self.hkdf, current, b"traffic upd", &[], self.hkdf.hash().output_len())
    }

    fn empty_hash(&self) -> Vec<u8> {
        self.hkdf.hash().digest(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ring_backend::test_sha256_hkdf as sha256_hkdf;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn ladder_stages_produce_distinct_secrets() {
        let schedule_hkdf = sha256_hkdf();
        let mut schedule = KeySchedule::new(schedule_hkdf, None);

        let ch_hash = vec![0xaa; 32];
        let early_traffic = schedule.client_early_traffic_secret(&ch_hash).unwrap();

        schedule.derive_handshake_secret(&[0x55; 32]).unwrap();
        let sh_hash = vec![0xbb; 32];
        let c_hs = schedule.client_handshake_traffic_secret(&sh_hash).unwrap();
        let s_hs = schedule.server_handshake_traffic_secret(&sh_hash).unwrap();
        assert_ne!(c_hs, s_hs);
        assert_ne!(c_hs, early_traffic);

        schedule.derive_master_secret().unwrap();
        let fin_hash = vec![0xcc; 32];
        let c_ap = schedule.client_application_traffic_secret_0(&fin_hash).unwrap();
        let s_ap = schedule.server_application_traffic_secret_0(&fin_hash).unwrap();
        assert_ne!(c_ap, s_ap);
        assert_ne!(c_ap, c_hs);
    }

    #[test]
    fn key_update_ratchet_is_one_way_and_deterministic() {
        let schedule = KeySchedule::new(sha256_hkdf(), None);
        let secret_n = vec![0x11; 32];
        let secret_n1 = schedule.next_traffic_secret(&secret_n).unwrap();
        let secret_n1_again = schedule.next_traffic_secret(&secret_n).unwrap();
        assert_eq!(secret_n1, secret_n1_again);
        assert_ne!(secret_n1, secret_n);
    }
}
