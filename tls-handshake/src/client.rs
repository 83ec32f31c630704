//! The client handshake state machine, client side of RFC 8446's
//! state diagram. `connect` drives a full handshake synchronously to
//! completion over a blocking `Read + Write` transport — this crate has a
//! single owner per connection and only ever blocks on record-layer I/O,
//! so there is no separate poll/step surface to maintain.

use std::io::{Read, Write};
use std::sync::Arc;

use tls_crypto::provider::Hkdf;
use tls_crypto::{resumption_psk, KeySchedule, TranscriptHash};
use tls_wire::extension::{
    AlpnProtocols, Cookie, EarlyDataIndication, Extension, KeyShareClientHello, KeyShareEntry, PreSharedKeyClientHello,
    PskIdentity, PskKeyExchangeModes, RecordSizeLimit, ServerNameList, SignatureSchemeList, SupportedGroupList,
};
use tls_wire::handshake::{ClientHello, HandshakeMessage, LEGACY_VERSION};
use tls_wire::{CipherSuite, NamedGroup, SignatureScheme};

use crate::alert::{Alert, AlertDescription};
use crate::cert::CertificateVerifier;
use crate::connection::{
    certificate_verify_content, clone_hkdf, fixed_time_eq, map_crypto, CryptoProviders, NegotiatedParams,
    CLIENT_CERTIFICATE_VERIFY_CONTEXT, SERVER_CERTIFICATE_VERIFY_CONTEXT,
};
use crate::error::{HandshakeError, Result};
use crate::keylog::{KeyLog, KeyLogLabel, NoKeyLog};
use crate::record::{Incoming, RecordLayer};
use crate::ticket::Ticket;

/// RFC 8446 §4.1.3: the last 8 bytes of `ServerHello.random` a TLS 1.3
/// server speaking to a downgrade-unaware client must never produce. This
/// crate only ever negotiates 1.3, so seeing either sentinel means a
/// downgrade attack (or a badly confused 1.3 peer) and is always fatal.
const DOWNGRADE_TO_TLS12_SENTINEL: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x01];
const DOWNGRADE_TO_TLS11_OR_BELOW_SENTINEL: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x00];

/// Where the client-side state machine currently sits, named to match
/// RFC 8446's diagram. Exposed for callers that want to assert on it in
/// tests; the state machine itself is linear within [`connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Start,
    WaitServerHello,
    WaitEncryptedExtensions,
    WaitCertificateOrCertificateRequest,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,
    Connected,
}

pub struct ClientConfig {
    pub server_name: Option<String>,
    pub cipher_suites: Vec<CipherSuite>,
    pub supported_groups: Vec<NamedGroup>,
    pub signature_schemes: Vec<SignatureScheme>,
    pub alpn_protocols: Vec<Vec<u8>>,
    pub record_size_limit: Option<u16>,
    pub psk: Option<Ticket>,
    pub early_data: Option<Vec<u8>>,
    pub key_log: Arc<dyn KeyLog>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            cipher_suites: vec![CipherSuite::Aes128GcmSha256, CipherSuite::Aes256GcmSha384, CipherSuite::Chacha20Poly1305Sha256],
            supported_groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1],
            signature_schemes: vec![
                SignatureScheme::EcdsaSecp256r1Sha256,
                SignatureScheme::Ed25519,
                SignatureScheme::RsaPssRsaeSha256,
                SignatureScheme::RsaPssRsaeSha384,
                SignatureScheme::RsaPssRsaeSha512,
            ],
            alpn_protocols: Vec::new(),
            record_size_limit: None,
            psk: None,
            early_data: None,
            key_log: Arc::new(NoKeyLog),
        }
    }
}

/// An established connection: the live record layer plus whatever state
/// post-handshake operations (`read`, `write`, `key_update`) still need.
pub struct ClientConnection<T> {
    record: RecordLayer<T>,
    negotiated: NegotiatedParams,
    client_random: [u8; 32],
    finished_len: usize,
    exporter_master_secret: Vec<u8>,
    resumption_master_secret: Vec<u8>,
    pending_tickets: Vec<Ticket>,
    early_data_accepted: bool,
    client_app_traffic_secret: Vec<u8>,
    server_app_traffic_secret: Vec<u8>,
}

impl<T: Read + Write> ClientConnection<T> {
    #[must_use]
    pub fn negotiated(&self) -> &NegotiatedParams {
        &self.negotiated
    }

    #[must_use]
    pub fn early_data_accepted(&self) -> bool {
        self.early_data_accepted
    }

    /// The `ClientHello.random` this connection negotiated under — the key
    /// an external NSS-format key-log file is indexed by.
    #[must_use]
    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    /// Drains any `NewSessionTicket`s the server has sent since the last
    /// call. A server may send several, or none at all.
    pub fn take_tickets(&mut self) -> Vec<Ticket> {
        std::mem::take(&mut self.pending_tickets)
    }

    /// RFC 8446 §7.5: derives `length` bytes of exported keying material
    /// under the given label and context, bound to this connection's
    /// exporter master secret.
    pub fn export_keying_material(&self, label: &[u8], context: &[u8], length: usize) -> Result<Vec<u8>> {
        let params = tls_crypto::params_for(self.negotiated.cipher_suite).map_err(map_crypto)?;
        let empty_context_hash = params.hkdf.hash().digest(context);
        let derived = tls_crypto::derive_secret(&*params.hkdf, &self.exporter_master_secret, label, &empty_context_hash)
            .map_err(map_crypto)?;
        tls_crypto::hkdf_expand_label(&*params.hkdf, &derived, b"exporter", &params.hkdf.hash().digest(&[]), length).map_err(map_crypto)
    }

    /// Reads one chunk of application data, transparently consuming any
    /// `NewSessionTicket`s or `KeyUpdate`s interleaved with it —
    /// post-handshake messages never surface to the caller as
    /// "unexpected").
    pub fn read(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.record.recv_next()? {
                Incoming::ApplicationData(data) => return Ok(data),
                Incoming::Handshake(bytes) => self.handle_post_handshake(&bytes)?,
                Incoming::Alert(alert) => return Err(self.handle_peer_alert(alert)),
            }
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.record.write_application_data(data).map_err(|e| self.fatal(e))
    }

    pub fn close(&mut self) -> Result<()> {
        self.record.write_alert(Alert::close_notify())
    }

    /// Ratchets this side's write traffic secret forward (RFC 8446 §7.2)
    /// and sends the `KeyUpdate` message announcing it.
    pub fn update_keys(&mut self, request_peer_update: bool) -> Result<()> {
        let params = tls_crypto::params_for(self.negotiated.cipher_suite).map_err(map_crypto)?;
        let request = if request_peer_update {
            tls_wire::handshake::KeyUpdateRequest::UpdateRequested
        } else {
            tls_wire::handshake::KeyUpdateRequest::UpdateNotRequested
        };
        let message = HandshakeMessage::KeyUpdate(tls_wire::handshake::KeyUpdate { request_update: request });
        let mut bytes = Vec::new();
        message.write_to(&mut bytes)?;
        self.record.write_handshake(&bytes)?;

        let updated = tls_crypto::hkdf_expand_label(&*params.hkdf, &self.client_app_traffic_secret, b"traffic upd", &[], params.hkdf.hash().output_len())
            .map_err(map_crypto)?;
        self.client_app_traffic_secret = updated.clone();
        let (key, iv) = (
            tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"key", &[], params.key_len).map_err(map_crypto)?,
            tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"iv", &[], params.iv_len).map_err(map_crypto)?,
        );
        self.record.set_write_keys(key, iv);
        Ok(())
    }

    fn handle_post_handshake(&mut self, bytes: &[u8]) -> Result<()> {
        let message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(bytes), self.finished_len)?;
        match message {
            HandshakeMessage::NewSessionTicket(nst) => {
                let lifetime = nst.ticket_lifetime;
                let ticket = Ticket::new(nst.ticket, nst.ticket_nonce, nst.ticket_age_add, lifetime, self.resumption_master_secret.clone(), self.negotiated.cipher_suite);
                self.pending_tickets.push(ticket);
                Ok(())
            }
            HandshakeMessage::KeyUpdate(ku) => {
                let params = tls_crypto::params_for(self.negotiated.cipher_suite).map_err(map_crypto)?;
                let updated = tls_crypto::hkdf_expand_label(&*params.hkdf, &self.server_app_traffic_secret, b"traffic upd", &[], params.hkdf.hash().output_len())
                    .map_err(map_crypto)?;
                self.server_app_traffic_secret = updated.clone();
                let key = tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"key", &[], params.key_len).map_err(map_crypto)?;
                let iv = tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"iv", &[], params.iv_len).map_err(map_crypto)?;
                self.record.set_read_keys(key, iv);
                if ku.request_update == tls_wire::handshake::KeyUpdateRequest::UpdateRequested {
                    self.update_keys(false)?;
                }
                Ok(())
            }
            _ => Err(HandshakeError::UnexpectedMessage { expected: "NewSessionTicket or KeyUpdate", state: "Connected" }),
        }
    }

    fn handle_peer_alert(&self, alert: Alert) -> HandshakeError {
        HandshakeError::PeerAlert(alert.description)
    }

    fn fatal(&mut self, err: HandshakeError) -> HandshakeError {
        if let Some(description) = err.as_alert() {
            let _ = self.record.write_alert(Alert::fatal(description));
        }
        err
    }
}

fn build_extensions(
    config: &ClientConfig,
    group: NamedGroup,
    key_share: &[u8],
    cookie: Option<&Cookie>,
) -> Vec<Extension> {
    let mut extensions = vec![
        Extension::SupportedVersionsClientHello(vec![tls_wire::extension::TLS1_3_PLACEHOLDER]),
        Extension::SupportedGroups(SupportedGroupList { groups: config.supported_groups.clone() }),
        Extension::SignatureAlgorithms(SignatureSchemeList { schemes: config.signature_schemes.clone() }),
        Extension::KeyShareClientHello(KeyShareClientHello { entries: vec![KeyShareEntry { group, key_exchange: key_share.to_vec() }] }),
    ];
    if let Some(name) = &config.server_name {
        extensions.push(Extension::ServerName(ServerNameList::host_name(name.clone())));
    }
    if !config.alpn_protocols.is_empty() {
        extensions.push(Extension::Alpn(AlpnProtocols::Offered(config.alpn_protocols.clone())));
    }
    if let Some(limit) = config.record_size_limit {
        if let Ok(limit) = RecordSizeLimit::new(limit) {
            extensions.push(Extension::RecordSizeLimit(limit));
        }
    }
    if let Some(cookie) = cookie {
        extensions.push(Extension::Cookie(cookie.clone()));
    }
    extensions
}

struct Psk {
    ticket: Ticket,
    hkdf: Box<dyn Hkdf>,
    ikm: Vec<u8>,
}

impl Psk {
    fn prepare(ticket: Ticket) -> Result<Self> {
        let params = tls_crypto::params_for(ticket.cipher_suite).map_err(map_crypto)?;
        let ikm = resumption_psk(&*params.hkdf, &ticket.resumption_master_secret, &ticket.ticket_nonce).map_err(map_crypto)?;
        Ok(Self { ticket, hkdf: params.hkdf, ikm })
    }

    fn binder_len(&self) -> usize {
        self.hkdf.hash().output_len()
    }
}

/// Appends a placeholder `pre_shared_key` extension (RFC 8446 §4.2.11:
/// "MUST be the last extension") and returns the byte offset, within the
/// fully-encoded `ClientHello` *handshake message* (header included), at
/// which the binder HMACs begin.
fn append_psk_placeholder(extensions: &mut Vec<Extension>, psk: &Psk) -> Result<usize> {
    let identity = PskIdentity { identity: psk.ticket.ticket.clone(), obfuscated_ticket_age: psk.ticket.obfuscated_ticket_age() };
    let placeholder = PreSharedKeyClientHello::with_placeholder_binders(vec![identity], psk.binder_len());
    extensions.push(Extension::PreSharedKeyClientHello(placeholder));
    Ok(0)
}

/// Computes the real PSK binder over `transcript_hash` and patches it into
/// `message_bytes` (a fully-encoded `ClientHello` handshake message whose
/// trailing bytes are still the zeroed placeholder from
/// [`append_psk_placeholder`]).
fn patch_binder(message_bytes: &mut [u8], binder_offset: usize, psk: &Psk, transcript_hash: &[u8]) -> Result<()> {
    let ks = KeySchedule::new(clone_hkdf(&*psk.hkdf), Some(&psk.ikm));
    let binder_key = ks.binder_key_resumption().map_err(map_crypto)?;
    let finished_key = ks.finished_key(&binder_key).map_err(map_crypto)?;
    let binder = tls_crypto::finished_mac(&*psk.hkdf, &finished_key, transcript_hash);
    // layout: 1-byte length prefix then the binder bytes, at the tail.
    let tail = &mut message_bytes[binder_offset..];
    let start = tail.len() - binder.len();
    tail[start..].copy_from_slice(&binder);
    Ok(())
}

pub fn connect<T: Read + Write>(transport: T, config: &ClientConfig, crypto: &CryptoProviders<'_>, verifier: &dyn CertificateVerifier) -> Result<ClientConnection<T>> {
    let mut record = RecordLayer::new(transport);

    let mut client_random = [0_u8; 32];
    crypto.rng.fill(&mut client_random).map_err(map_crypto)?;
    let mut legacy_session_id = vec![0_u8; 32];
    crypto.rng.fill(&mut legacy_session_id).map_err(map_crypto)?;

    let initial_group = *config.supported_groups.first().ok_or(HandshakeError::NoCommonGroup)?;
    let (mut ephemeral_secret, mut client_public) = crypto.key_exchange.generate(initial_group, crypto.rng).map_err(map_crypto)?;
    let mut offered_group = initial_group;

    let psk = config.psk.clone().map(Psk::prepare).transpose()?;

    let mut extensions = build_extensions(config, offered_group, &client_public, None);
    if let Some(psk) = &psk {
        extensions.push(Extension::PskKeyExchangeModes(PskKeyExchangeModes::psk_dhe_ke_only()));
        if config.early_data.is_some() {
            extensions.push(Extension::EarlyData(EarlyDataIndication::Indication));
        }
        let _ = append_psk_placeholder(&mut extensions, psk)?;
    }

    let mut client_hello = ClientHello {
        legacy_version: LEGACY_VERSION,
        random: client_random,
        legacy_session_id: legacy_session_id.clone(),
        cipher_suites: config.cipher_suites.clone(),
        extensions,
    };

    let mut ch1_bytes = encode_client_hello(&client_hello)?;
    if let Some(psk) = &psk {
        let binder_offset = 4 + client_hello.psk_binders_offset().ok_or(HandshakeError::MissingExtension("pre_shared_key"))?;
        let truncated = ch1_bytes[..binder_offset].to_vec();
        let provisional = TranscriptHash::new(psk.hkdf.boxed_hash());
        let hash = provisional.snapshot_with_extra(&truncated);
        patch_binder(&mut ch1_bytes, binder_offset, psk, &hash)?;
        // keep `client_hello` in sync so a later CH2 rebuild (after HRR)
        // starts from an identically-shaped message.
        client_hello = decode_client_hello(&ch1_bytes)?;
    }

    record.write_handshake(&ch1_bytes)?;
    record.send_compat_change_cipher_spec()?;

    let early_traffic_installed = if let (Some(psk), Some(early_data)) = (&psk, &config.early_data) {
        install_early_traffic(&mut record, &mut record_scratch_transcript(&ch1_bytes, psk)?, psk, &client_random, config.key_log.as_ref())?;
        record.write_application_data(early_data)?;
        true
    } else {
        false
    };
    let _ = early_traffic_installed;

    // --- Receive ServerHello or HelloRetryRequest ---
    let first_reply = record.recv_next()?;
    let first_reply_bytes = match first_reply {
        Incoming::Handshake(bytes) => bytes,
        Incoming::Alert(alert) => return Err(HandshakeError::PeerAlert(alert.description)),
        Incoming::ApplicationData(_) => return Err(HandshakeError::UnexpectedMessage { expected: "ServerHello", state: "WaitServerHello" }),
    };
    let first_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&first_reply_bytes), 0)?;

    let (server_hello, mut transcript, retried) = match first_message {
        HandshakeMessage::HelloRetryRequest(hrr) => {
            let hash = hash_for_suite(hrr.cipher_suite)?;
            let mut transcript = TranscriptHash::new(hash);
            transcript.append(&ch1_bytes);
            transcript.replace_with_message_hash();
            transcript.append(&first_reply_bytes);

            let new_group = find_hrr_group(&hrr)?;
            let cookie = find_cookie(&hrr);
            if new_group != offered_group {
                let (secret, public) = crypto.key_exchange.generate(new_group, crypto.rng).map_err(map_crypto)?;
                ephemeral_secret = secret;
                client_public = public;
                offered_group = new_group;
            }

            let mut extensions2 = build_extensions(config, offered_group, &client_public, cookie.as_ref());
            if let Some(psk) = &psk {
                extensions2.push(Extension::PskKeyExchangeModes(PskKeyExchangeModes::psk_dhe_ke_only()));
                let _ = append_psk_placeholder(&mut extensions2, psk)?;
            }
            let mut ch2 = ClientHello {
                legacy_version: LEGACY_VERSION,
                random: client_random,
                legacy_session_id,
                cipher_suites: config.cipher_suites.clone(),
                extensions: extensions2,
            };
            let mut ch2_bytes = encode_client_hello(&ch2)?;
            if let Some(psk) = &psk {
                let binder_offset = 4 + ch2.psk_binders_offset().ok_or(HandshakeError::MissingExtension("pre_shared_key"))?;
                let hash = transcript.snapshot_with_extra(&ch2_bytes[..binder_offset]);
                patch_binder(&mut ch2_bytes, binder_offset, psk, &hash)?;
                ch2 = decode_client_hello(&ch2_bytes)?;
                let _ = ch2;
            }
            transcript.append(&ch2_bytes);
            record.write_handshake(&ch2_bytes)?;

            let reply = record.recv_next()?;
            let reply_bytes = match reply {
                Incoming::Handshake(bytes) => bytes,
                Incoming::Alert(alert) => return Err(HandshakeError::PeerAlert(alert.description)),
                Incoming::ApplicationData(_) => return Err(HandshakeError::UnexpectedMessage { expected: "ServerHello", state: "WaitServerHello" }),
            };
            let message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&reply_bytes), 0)?;
            match message {
                HandshakeMessage::ServerHello(sh) => {
                    transcript.append(&reply_bytes);
                    (sh, transcript, true)
                }
                HandshakeMessage::HelloRetryRequest(_) => {
                    return Err(HandshakeError::UnexpectedMessage { expected: "ServerHello", state: "WaitServerHello" })
                }
                _ => return Err(HandshakeError::UnexpectedMessage { expected: "ServerHello", state: "WaitServerHello" }),
            }
        }
        HandshakeMessage::ServerHello(sh) => {
            let hash = hash_for_suite(sh.cipher_suite)?;
            let mut transcript = TranscriptHash::new(hash);
            transcript.append(&ch1_bytes);
            transcript.append(&first_reply_bytes);
            (sh, transcript, false)
        }
        _ => return Err(HandshakeError::UnexpectedMessage { expected: "ServerHello", state: "WaitServerHello" }),
    };
    let _ = retried;

    check_downgrade_sentinel(&server_hello.random)?;

    let params = tls_crypto::params_for(server_hello.cipher_suite).map_err(map_crypto)?;
    record.install_aead(tls_crypto::params_for(server_hello.cipher_suite).map_err(map_crypto)?.aead);

    let selected_group = server_hello
        .extensions
        .iter()
        .find_map(|ext| match ext {
            Extension::KeyShareServerHello(entry) => Some(entry.0.group),
            _ => None,
        })
        .ok_or(HandshakeError::MissingExtension("key_share"))?;
    if selected_group != offered_group {
        return Err(HandshakeError::IllegalParameter("server selected a group the client did not offer"));
    }
    let peer_public = server_hello
        .extensions
        .iter()
        .find_map(|ext| match ext {
            Extension::KeyShareServerHello(entry) => Some(entry.0.key_exchange.clone()),
            _ => None,
        })
        .ok_or(HandshakeError::MissingExtension("key_share"))?;

    let psk_selected = server_hello.extensions.iter().find_map(|ext| match ext {
        Extension::PreSharedKeyServerHello(sel) => Some(sel.selected_identity),
        _ => None,
    });

    let dhe_shared = ephemeral_secret.agree(&peer_public).map_err(map_crypto)?;

    let mut key_schedule = match (&psk, psk_selected) {
        (Some(psk), Some(0)) => KeySchedule::new(clone_hkdf(&*params.hkdf), Some(&psk.ikm)),
        _ => KeySchedule::new(clone_hkdf(&*params.hkdf), None),
    };
    let resuming = matches!(psk_selected, Some(0));
    key_schedule.derive_handshake_secret(&dhe_shared).map_err(map_crypto)?;

    let sh_hash = transcript.current_hash();
    let client_hs_secret = key_schedule.client_handshake_traffic_secret(&sh_hash).map_err(map_crypto)?;
    let server_hs_secret = key_schedule.server_handshake_traffic_secret(&sh_hash).map_err(map_crypto)?;
    config.key_log.log(KeyLogLabel::ClientHandshakeTrafficSecret, &client_random, &client_hs_secret);
    config.key_log.log(KeyLogLabel::ServerHandshakeTrafficSecret, &client_random, &server_hs_secret);

    let (server_key, server_iv) = key_schedule.traffic_key_and_iv(&server_hs_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_read_keys(server_key, server_iv);

    // --- EncryptedExtensions ---
    let ee_bytes = expect_handshake(&mut record)?;
    let ee_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&ee_bytes), params.hkdf.hash().output_len())?;
    let ee = match ee_message {
        HandshakeMessage::EncryptedExtensions(ee) => ee,
        _ => return Err(HandshakeError::UnexpectedMessage { expected: "EncryptedExtensions", state: "WaitEncryptedExtensions" }),
    };
    transcript.append(&ee_bytes);

    let early_data_accepted = psk.is_some() && ee.extensions.iter().any(|ext| matches!(ext, Extension::EarlyData(_)));
    let alpn = ee.extensions.iter().find_map(|ext| match ext {
        Extension::Alpn(AlpnProtocols::Selected(proto)) => Some(proto.clone()),
        _ => None,
    });
    if let Some(limit) = ee.extensions.iter().find_map(|ext| match ext {
        Extension::RecordSizeLimit(limit) => Some(limit.get()),
        _ => None,
    }) {
        record.set_peer_record_size_limit(limit as usize);
    }

    // --- Server authentication (skipped entirely when resuming) ---
    let mut signature_scheme = None;
    if !resuming {
        let next = expect_handshake(&mut record)?;
        let next_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&next), params.hkdf.hash().output_len())?;
        let (certificate_bytes, certificate) = match next_message {
            HandshakeMessage::CertificateRequest(_) => {
                // client certificates: out of scope beyond acknowledging the
                // request, so nothing to record here except moving on to the
                // Certificate message proper.
                transcript.append(&next);
                let cert_bytes = expect_handshake(&mut record)?;
                let cert_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&cert_bytes), params.hkdf.hash().output_len())?;
                match cert_message {
                    HandshakeMessage::Certificate(cert) => (cert_bytes, cert),
                    _ => return Err(HandshakeError::UnexpectedMessage { expected: "Certificate", state: "WaitCertificate" }),
                }
            }
            HandshakeMessage::Certificate(cert) => (next, cert),
            _ => return Err(HandshakeError::UnexpectedMessage { expected: "Certificate", state: "WaitCertificateOrCertificateRequest" }),
        };
        transcript.append(&certificate_bytes);

        let chain: Vec<Vec<u8>> = certificate.entries.iter().map(|e| e.cert_data.clone()).collect();
        verifier.verify(&chain, config.server_name.as_deref())?;
        let leaf_public_key = verifier.leaf_public_key(&chain)?;

        let cv_bytes = expect_handshake(&mut record)?;
        let cv_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&cv_bytes), params.hkdf.hash().output_len())?;
        let certificate_verify = match cv_message {
            HandshakeMessage::CertificateVerify(cv) => cv,
            _ => return Err(HandshakeError::UnexpectedMessage { expected: "CertificateVerify", state: "WaitCertificateVerify" }),
        };
        let content = certificate_verify_content(SERVER_CERTIFICATE_VERIFY_CONTEXT, &transcript.current_hash());
        crypto
            .signature_verifier
            .verify(certificate_verify.algorithm, &content, &certificate_verify.signature, &leaf_public_key)
            .map_err(map_crypto)?;
        signature_scheme = Some(certificate_verify.algorithm);
        transcript.append(&cv_bytes);
    }

    // --- Server Finished ---
    let fin_bytes = expect_handshake(&mut record)?;
    let fin_message = HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&fin_bytes), params.hkdf.hash().output_len())?;
    let server_finished = match fin_message {
        HandshakeMessage::Finished(f) => f,
        _ => return Err(HandshakeError::UnexpectedMessage { expected: "Finished", state: "WaitFinished" }),
    };
    let server_finished_key = key_schedule.finished_key(&server_hs_secret).map_err(map_crypto)?;
    let expected = tls_crypto::finished_mac(&*params.hkdf, &server_finished_key, &transcript.current_hash());
    if !fixed_time_eq(&expected, &server_finished.verify_data) {
        return Err(HandshakeError::FinishedMismatch);
    }
    transcript.append(&fin_bytes);
    // RFC 8446 §7.1: "c ap traffic"/"s ap traffic"/"exp master" are derived
    // from the transcript through server Finished *only* — EndOfEarlyData
    // and the client's own Finished, both of which follow on the wire,
    // must not be folded in yet. Capture the hash here, before either.
    let server_finished_hash = transcript.current_hash();

    // --- Send EndOfEarlyData (still under early-data write keys), then
    // switch to handshake write keys for Finished. RFC 8446 Appendix A.1:
    // K_send becomes handshake only *after* EndOfEarlyData is sent. ---
    if early_data_accepted {
        let eod = HandshakeMessage::EndOfEarlyData;
        let mut bytes = Vec::new();
        eod.write_to(&mut bytes)?;
        record.write_handshake(&bytes)?;
        transcript.append(&bytes);
    }

    let (client_key, client_iv) = key_schedule.traffic_key_and_iv(&client_hs_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_write_keys(client_key, client_iv);

    key_schedule.derive_master_secret().map_err(map_crypto)?;
    let client_finished_key = key_schedule.finished_key(&client_hs_secret).map_err(map_crypto)?;
    let client_verify_data = tls_crypto::finished_mac(&*params.hkdf, &client_finished_key, &transcript.current_hash());
    let client_finished = HandshakeMessage::Finished(tls_wire::handshake::Finished { verify_data: client_verify_data });
    let mut client_finished_bytes = Vec::new();
    client_finished.write_to(&mut client_finished_bytes)?;
    record.write_handshake(&client_finished_bytes)?;
    transcript.append(&client_finished_bytes);

    let client_ap_secret = key_schedule.client_application_traffic_secret_0(&server_finished_hash).map_err(map_crypto)?;
    let server_ap_secret = key_schedule.server_application_traffic_secret_0(&server_finished_hash).map_err(map_crypto)?;
    let exporter_master_secret = key_schedule.exporter_master_secret(&server_finished_hash).map_err(map_crypto)?;
    config.key_log.log(KeyLogLabel::ClientTrafficSecret0, &client_random, &client_ap_secret);
    config.key_log.log(KeyLogLabel::ServerTrafficSecret0, &client_random, &server_ap_secret);
    config.key_log.log(KeyLogLabel::ExporterSecret, &client_random, &exporter_master_secret);

    let (client_ap_key, client_ap_iv) = key_schedule.traffic_key_and_iv(&client_ap_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    let (server_ap_key, server_ap_iv) = key_schedule.traffic_key_and_iv(&server_ap_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_write_keys(client_ap_key, client_ap_iv);
    record.set_read_keys(server_ap_key, server_ap_iv);

    // resumption_master_secret is derived over the transcript through the
    // client's own Finished, per RFC 8446 §7.1 — the current hash, which
    // now includes client_finished_bytes.
    let resumption_master_secret = key_schedule.resumption_master_secret(&transcript.current_hash()).map_err(map_crypto)?;

    Ok(ClientConnection {
        record,
        negotiated: NegotiatedParams {
            cipher_suite: server_hello.cipher_suite,
            group: selected_group,
            signature_scheme,
            alpn,
            server_name: config.server_name.clone(),
        },
        client_random,
        finished_len: params.hkdf.hash().output_len(),
        exporter_master_secret,
        resumption_master_secret,
        pending_tickets: Vec::new(),
        early_data_accepted,
        client_app_traffic_secret: client_ap_secret,
        server_app_traffic_secret: server_ap_secret,
    })
}

fn expect_handshake<T: Read + Write>(record: &mut RecordLayer<T>) -> Result<Vec<u8>> {
    match record.recv_next()? {
        Incoming::Handshake(bytes) => Ok(bytes),
        Incoming::Alert(alert) => Err(HandshakeError::PeerAlert(alert.description)),
        Incoming::ApplicationData(_) => Err(HandshakeError::UnexpectedMessage { expected: "handshake message", state: "handshake" }),
    }
}

fn encode_client_hello(ch: &ClientHello) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    HandshakeMessage::ClientHello(ch.clone()).write_to(&mut bytes)?;
    Ok(bytes)
}

fn decode_client_hello(message_bytes: &[u8]) -> Result<ClientHello> {
    match HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(message_bytes), 0)? {
        HandshakeMessage::ClientHello(ch) => Ok(ch),
        _ => Err(HandshakeError::UnexpectedMessage { expected: "ClientHello", state: "Start" }),
    }
}

fn hash_for_suite(suite: CipherSuite) -> Result<Box<dyn tls_crypto::provider::Hash>> {
    Ok(tls_crypto::params_for(suite).map_err(map_crypto)?.hkdf.boxed_hash())
}

fn find_hrr_group(hrr: &tls_wire::handshake::ServerHello) -> Result<NamedGroup> {
    hrr.extensions
        .iter()
        .find_map(|ext| match ext {
            Extension::KeyShareHelloRetryRequest(g) => Some(g.0),
            _ => None,
        })
        .ok_or(HandshakeError::MissingExtension("key_share"))
}

fn find_cookie(hrr: &tls_wire::handshake::ServerHello) -> Option<Cookie> {
    hrr.extensions.iter().find_map(|ext| match ext {
        Extension::Cookie(c) => Some(c.clone()),
        _ => None,
    })
}

fn check_downgrade_sentinel(random: &[u8; 32]) -> Result<()> {
    let tail = &random[24..32];
    if tail == DOWNGRADE_TO_TLS12_SENTINEL || tail == DOWNGRADE_TO_TLS11_OR_BELOW_SENTINEL {
        return Err(HandshakeError::IllegalParameter("server_random carries a TLS 1.3 downgrade sentinel"));
    }
    Ok(())
}

/// Rebuilds a one-shot `TranscriptHash` over exactly `ch1_bytes`, for the
/// 0-RTT early-traffic-secret derivation that happens before the real
/// running transcript (which needs the negotiated suite from ServerHello)
/// exists. `psk.hkdf`'s hash is guaranteed to match by construction only
/// when the server goes on to accept this PSK; if it doesn't, the derived
/// early traffic secret is simply never used for anything real.
fn record_scratch_transcript(ch1_bytes: &[u8], psk: &Psk) -> Result<TranscriptHash> {
    let mut transcript = TranscriptHash::new(psk.hkdf.boxed_hash());
    transcript.append(ch1_bytes);
    Ok(transcript)
}

fn install_early_traffic<T: Read + Write>(
    record: &mut RecordLayer<T>,
    transcript: &mut TranscriptHash,
    psk: &Psk,
    client_random: &[u8; 32],
    key_log: &dyn KeyLog,
) -> Result<()> {
    let params = tls_crypto::params_for(psk.ticket.cipher_suite).map_err(map_crypto)?;
    let early_secret = KeySchedule::new(clone_hkdf(&*psk.hkdf), Some(&psk.ikm));
    let early_traffic_secret = early_secret.client_early_traffic_secret(&transcript.current_hash()).map_err(map_crypto)?;
    key_log.log(KeyLogLabel::ClientEarlyTrafficSecret, client_random, &early_traffic_secret);
    let (key, iv) = early_secret.traffic_key_and_iv(&early_traffic_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.install_aead(params.aead);
    record.set_write_keys(key, iv);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordinary_random_passes_the_downgrade_check() {
        assert!(check_downgrade_sentinel(&[0x42; 32]).is_ok());
    }

    #[test]
    fn tls12_downgrade_sentinel_is_rejected() {
        let mut random = [0x11_u8; 32];
        random[24..32].copy_from_slice(&DOWNGRADE_TO_TLS12_SENTINEL);
        assert!(matches!(check_downgrade_sentinel(&random), Err(HandshakeError::IllegalParameter(_))));
    }

    #[test]
    fn tls11_or_below_downgrade_sentinel_is_rejected() {
        let mut random = [0x22_u8; 32];
        random[24..32].copy_from_slice(&DOWNGRADE_TO_TLS11_OR_BELOW_SENTINEL);
        assert!(matches!(check_downgrade_sentinel(&random), Err(HandshakeError::IllegalParameter(_))));
    }
}

