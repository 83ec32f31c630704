//! The server handshake state machine, server side of RFC 8446's state
//! diagram: START → RECVD_CH → NEGOTIATED → (WAIT_EOED)
//! → WAIT_FLIGHT2 → WAIT_FINISHED → CONNECTED, driven synchronously to
//! completion by [`accept`] exactly as [`crate::client::connect`] drives
//! the client side.

use std::io::{Read, Write};
use std::sync::Arc;

use tls_crypto::{resumption_psk, KeySchedule, TranscriptHash};
use tls_wire::extension::{
    AlpnProtocols, EarlyDataIndication, Extension, KeyShareEntry, KeyShareHelloRetryRequest, KeyShareServerHello,
    PreSharedKeyServerHello, RecordSizeLimit,
};
use tls_wire::handshake::{
    Certificate, CertificateEntry, EncryptedExtensions, HandshakeMessage, ServerHello, HELLO_RETRY_REQUEST_RANDOM, LEGACY_VERSION,
};
use tls_wire::{CipherSuite, NamedGroup};

use crate::alert::Alert;
use crate::cert::CertificateProvider;
use crate::connection::{
    certificate_verify_content, clone_hkdf, fixed_time_eq, map_crypto, CryptoProviders, NegotiatedParams, SERVER_CERTIFICATE_VERIFY_CONTEXT,
};
use crate::error::{HandshakeError, Result};
use crate::keylog::{KeyLog, KeyLogLabel, NoKeyLog};
use crate::record::{Incoming, RecordLayer};
use crate::ticket::{StrikeRegister, Ticket};

/// Where the server-side state machine currently sits. Exposed for tests
/// that want to assert on it; [`accept`] itself is linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Start,
    RecvdClientHello,
    Negotiated,
    WaitEndOfEarlyData,
    WaitFlight2,
    WaitFinished,
    Connected,
}

/// A server's view of one offered PSK: looked up by ticket identity bytes
/// at the point a ClientHello's `pre_shared_key` extension is processed.
pub trait PskStore {
    fn find(&self, identity: &[u8]) -> Option<Ticket>;
}

/// No PSKs known: every resumption attempt falls through to a full
/// handshake. The default for a server that hasn't wired up ticket
/// storage.
pub struct NoPsks;

impl PskStore for NoPsks {
    fn find(&self, _identity: &[u8]) -> Option<Ticket> {
        None
    }
}

pub struct ServerConfig {
    /// Preference order: the first entry mutually supported with the
    /// client wins.
    pub cipher_suites: Vec<CipherSuite>,
    pub supported_groups: Vec<NamedGroup>,
    pub alpn_protocols: Vec<Vec<u8>>,
    pub record_size_limit: Option<u16>,
    pub key_log: Arc<dyn KeyLog>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cipher_suites: vec![CipherSuite::Aes128GcmSha256, CipherSuite::Aes256GcmSha384, CipherSuite::Chacha20Poly1305Sha256],
            supported_groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1],
            alpn_protocols: Vec::new(),
            record_size_limit: None,
            key_log: Arc::new(NoKeyLog),
        }
    }
}

/// An established connection, the server-side mirror of
/// [`crate::client::ClientConnection`].
pub struct ServerConnection<T> {
    record: RecordLayer<T>,
    negotiated: NegotiatedParams,
    client_random: [u8; 32],
    finished_len: usize,
    exporter_master_secret: Vec<u8>,
    resumption_master_secret: Vec<u8>,
    early_data_accepted: bool,
    early_data: Vec<u8>,
    client_app_traffic_secret: Vec<u8>,
    server_app_traffic_secret: Vec<u8>,
}

impl<T: Read + Write> ServerConnection<T> {
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

    /// Drains the 0-RTT application data received before the handshake
    /// completed, if any (empty when early data wasn't accepted).
    pub fn take_early_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.early_data)
    }

    pub fn export_keying_material(&self, label: &[u8], context: &[u8], length: usize) -> Result<Vec<u8>> {
        let params = tls_crypto::params_for(self.negotiated.cipher_suite).map_err(map_crypto)?;
        let empty_context_hash = params.hkdf.hash().digest(context);
        let derived = tls_crypto::derive_secret(&*params.hkdf, &self.exporter_master_secret, label, &empty_context_hash)
            .map_err(map_crypto)?;
        tls_crypto::hkdf_expand_label(&*params.hkdf, &derived, b"exporter", &params.hkdf.hash().digest(&[]), length).map_err(map_crypto)
    }

    pub fn read(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.record.recv_next()? {
                Incoming::ApplicationData(data) => return Ok(data),
                Incoming::Handshake(bytes) => self.handle_post_handshake(&bytes)?,
                Incoming::Alert(alert) => return Err(HandshakeError::PeerAlert(alert.description)),
            }
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.record.write_application_data(data).map_err(|e| self.fatal(e))
    }

    pub fn close(&mut self) -> Result<()> {
        self.record.write_alert(Alert::close_notify())
    }

    /// Issues a `NewSessionTicket`, which the server may send any time
    /// after the connection is established. `nonce` must be
    /// unique per ticket issued on this connection — callers typically
    /// keep a counter.
    pub fn issue_ticket(&mut self, rng: &dyn tls_crypto::provider::Csprng, lifetime_seconds: u32, nonce: &[u8]) -> Result<Ticket> {
        let mut ticket_bytes = vec![0_u8; 32];
        rng.fill(&mut ticket_bytes).map_err(map_crypto)?;
        let mut ticket_age_add = [0_u8; 4];
        rng.fill(&mut ticket_age_add).map_err(map_crypto)?;
        let ticket_age_add = u32::from_be_bytes(ticket_age_add);

        // The PSK itself is re-derived on redemption from
        // (resumption_master_secret, nonce) via `resumption_psk` — nothing
        // beyond the nonce needs to be persisted alongside the ticket.
        let ticket = Ticket::new(ticket_bytes.clone(), nonce.to_vec(), ticket_age_add, lifetime_seconds, self.resumption_master_secret.clone(), self.negotiated.cipher_suite);

        let message = HandshakeMessage::NewSessionTicket(tls_wire::handshake::NewSessionTicket {
            ticket_lifetime: ticket.lifetime_seconds,
            ticket_age_add,
            ticket_nonce: nonce.to_vec(),
            ticket: ticket_bytes,
            extensions: Vec::new(),
        });
        let mut bytes = Vec::new();
        message.write_to(&mut bytes)?;
        self.record.write_handshake(&bytes)?;
        Ok(ticket)
    }

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

        let updated = tls_crypto::hkdf_expand_label(&*params.hkdf, &self.server_app_traffic_secret, b"traffic upd", &[], params.hkdf.hash().output_len())
            .map_err(map_crypto)?;
        self.server_app_traffic_secret = updated.clone();
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
            HandshakeMessage::KeyUpdate(ku) => {
                let params = tls_crypto::params_for(self.negotiated.cipher_suite).map_err(map_crypto)?;
                let updated = tls_crypto::hkdf_expand_label(&*params.hkdf, &self.client_app_traffic_secret, b"traffic upd", &[], params.hkdf.hash().output_len())
                    .map_err(map_crypto)?;
                self.client_app_traffic_secret = updated.clone();
                let key = tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"key", &[], params.key_len).map_err(map_crypto)?;
                let iv = tls_crypto::hkdf_expand_label(&*params.hkdf, &updated, b"iv", &[], params.iv_len).map_err(map_crypto)?;
                self.record.set_read_keys(key, iv);
                if ku.request_update == tls_wire::handshake::KeyUpdateRequest::UpdateRequested {
                    self.update_keys(false)?;
                }
                Ok(())
            }
            _ => Err(HandshakeError::UnexpectedMessage { expected: "KeyUpdate", state: "Connected" }),
        }
    }

    fn fatal(&mut self, err: HandshakeError) -> HandshakeError {
        if let Some(description) = err.as_alert() {
            let _ = self.record.write_alert(Alert::fatal(description));
        }
        err
    }
}

struct NegotiatedOffer {
    group: NamedGroup,
    peer_key_share: Option<Vec<u8>>,
}

/// RFC 8446 §4.1.1: picks the first cipher suite in `config`'s preference
/// order that the client also offered.
fn negotiate_cipher_suite(config: &ServerConfig, offered: &[CipherSuite]) -> Result<CipherSuite> {
    config.cipher_suites.iter().copied().find(|s| offered.contains(s)).ok_or(HandshakeError::NoCommonCipher)
}

/// Per RFC 8446 §4.1.2: prefers a group the client already
/// sent a `key_share` for; falls back to any mutually supported group
/// named only in `supported_groups`, signalling a HelloRetryRequest is
/// needed by returning `peer_key_share: None`.
fn negotiate_group(
    config: &ServerConfig,
    key_share: Option<&tls_wire::extension::KeyShareClientHello>,
    supported_groups: Option<&tls_wire::extension::SupportedGroupList>,
) -> Result<NegotiatedOffer> {
    for &group in &config.supported_groups {
        if let Some(entry) = key_share.and_then(|ks| ks.find(group)) {
            return Ok(NegotiatedOffer { group, peer_key_share: Some(entry.key_exchange.clone()) });
        }
    }
    for &group in &config.supported_groups {
        if supported_groups.is_some_and(|sg| sg.groups.contains(&group)) {
            return Ok(NegotiatedOffer { group, peer_key_share: None });
        }
    }
    Err(HandshakeError::NoCommonGroup)
}

fn expect_handshake<T: Read + Write>(record: &mut RecordLayer<T>) -> Result<Vec<u8>> {
    match record.recv_next()? {
        Incoming::Handshake(bytes) => Ok(bytes),
        Incoming::Alert(alert) => Err(HandshakeError::PeerAlert(alert.description)),
        Incoming::ApplicationData(_) => Err(HandshakeError::UnexpectedMessage { expected: "handshake message", state: "handshake" }),
    }
}

fn find_extension<'a, R>(extensions: &'a [Extension], f: impl Fn(&'a Extension) -> Option<R>) -> Option<R> {
    extensions.iter().find_map(f)
}

/// Drives one full server-side handshake to completion over `transport`,
/// blocking on record-layer I/O exactly as [`crate::client::connect`]
/// does on the client side.
pub fn accept<T: Read + Write>(
    transport: T,
    config: &ServerConfig,
    crypto: &CryptoProviders<'_>,
    cert: &dyn CertificateProvider,
    psk_store: &dyn PskStore,
    strikes: &mut StrikeRegister,
) -> Result<ServerConnection<T>> {
    let mut record = RecordLayer::new(transport);

    // --- RECVD_CH: first ClientHello ---
    let ch1_bytes = expect_handshake(&mut record)?;
    let ch1 = match HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&ch1_bytes), 0)? {
        HandshakeMessage::ClientHello(ch) => ch,
        _ => return Err(HandshakeError::UnexpectedMessage { expected: "ClientHello", state: "Start" }),
    };

    let cipher_suite = negotiate_cipher_suite(config, &ch1.cipher_suites)?;
    let params = tls_crypto::params_for(cipher_suite).map_err(map_crypto)?;

    let key_share = find_extension(&ch1.extensions, |e| match e {
        Extension::KeyShareClientHello(ks) => Some(ks),
        _ => None,
    });
    let supported_groups = find_extension(&ch1.extensions, |e| match e {
        Extension::SupportedGroups(sg) => Some(sg),
        _ => None,
    });
    let offer = negotiate_group(config, key_share, supported_groups)?;

    // Binder HMACs cover the transcript up to (not including) the binders
    // list itself, so each candidate ClientHello's prefix hash has to be
    // snapshotted right before its full bytes go into the live transcript.
    let ch1_binder_prefix_hash = ch1
        .psk_binders_offset()
        .map(|offset| TranscriptHash::new(params.hkdf.boxed_hash()).snapshot_with_extra(&ch1_bytes[..(4 + offset).min(ch1_bytes.len())]));

    let mut transcript = TranscriptHash::new(params.hkdf.boxed_hash());
    transcript.append(&ch1_bytes);

    // --- NEGOTIATED: HelloRetryRequest if the client's key_share missed ---
    let (client_hello, retried, binder_prefix_hash) = if offer.peer_key_share.is_none() {
        let hrr = ServerHello {
            legacy_version: LEGACY_VERSION,
            random: HELLO_RETRY_REQUEST_RANDOM,
            legacy_session_id_echo: ch1.legacy_session_id.clone(),
            cipher_suite,
            extensions: vec![
                Extension::SupportedVersionsServerHello(0x0304),
                Extension::KeyShareHelloRetryRequest(KeyShareHelloRetryRequest(offer.group)),
            ],
        };
        let mut hrr_bytes = Vec::new();
        HandshakeMessage::HelloRetryRequest(hrr).write_to(&mut hrr_bytes)?;
        record.write_handshake(&hrr_bytes)?;
        record.send_compat_change_cipher_spec()?;

        transcript.replace_with_message_hash();
        transcript.append(&hrr_bytes);

        let ch2_bytes = expect_handshake(&mut record)?;
        let ch2 = match HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&ch2_bytes), 0)? {
            HandshakeMessage::ClientHello(ch) => ch,
            _ => return Err(HandshakeError::UnexpectedMessage { expected: "ClientHello", state: "Start" }),
        };
        let ch2_binder_prefix_hash = ch2
            .psk_binders_offset()
            .map(|offset| transcript.snapshot_with_extra(&ch2_bytes[..(4 + offset).min(ch2_bytes.len())]));
        transcript.append(&ch2_bytes);
        (ch2, true, ch2_binder_prefix_hash)
    } else {
        record.send_compat_change_cipher_spec()?;
        (ch1.clone(), false, ch1_binder_prefix_hash)
    };

    let peer_public = if retried {
        find_extension(&client_hello.extensions, |e| match e {
            Extension::KeyShareClientHello(ks) => ks.find(offer.group).map(|entry| entry.key_exchange.clone()),
            _ => None,
        })
        .ok_or(HandshakeError::MissingExtension("key_share"))?
    } else {
        offer.peer_key_share.clone().ok_or(HandshakeError::MissingExtension("key_share"))?
    };

    // --- PSK negotiation (only ever against the ClientHello that actually
    // carries the extension — re-sent in CH2 if a retry happened) ---
    let psk_modes_ok = find_extension(&client_hello.extensions, |e| match e {
        Extension::PskKeyExchangeModes(m) => Some(m.offers_psk_dhe_ke()),
        _ => None,
    })
    .unwrap_or(false);
    let offered_psk = find_extension(&client_hello.extensions, |e| match e {
        Extension::PreSharedKeyClientHello(psk) => Some(psk),
        _ => None,
    });

    let mut accepted_ticket: Option<Ticket> = None;
    if psk_modes_ok {
        if let Some(psk_ext) = offered_psk {
            if let Some(identity) = psk_ext.identities.first() {
                if let Some(ticket) = psk_store.find(&identity.identity) {
                    if ticket.is_usable() && ticket.cipher_suite == cipher_suite {
                        let psk_params = tls_crypto::params_for(ticket.cipher_suite).map_err(map_crypto)?;
                        let ikm = resumption_psk(&*psk_params.hkdf, &ticket.resumption_master_secret, &ticket.ticket_nonce).map_err(map_crypto)?;
                        let binder_key_schedule = KeySchedule::new(psk_params.hkdf, Some(&ikm));
                        let binder_key = binder_key_schedule.binder_key_resumption().map_err(map_crypto)?;
                        let finished_key = binder_key_schedule.finished_key(&binder_key).map_err(map_crypto)?;

                        let binder_transcript_hash = binder_prefix_hash.as_ref().ok_or(HandshakeError::MissingExtension("pre_shared_key"))?;
                        let expected_binder = tls_crypto::finished_mac(&*psk_params.hkdf, &finished_key, binder_transcript_hash);

                        if let Some(got_binder) = psk_ext.binders.first() {
                            if fixed_time_eq(&expected_binder, got_binder) {
                                accepted_ticket = Some(ticket);
                            } else {
                                return Err(HandshakeError::FinishedMismatch);
                            }
                        }
                    }
                }
            }
        }
    }

    let early_data_requested = find_extension(&client_hello.extensions, |e| matches!(e, Extension::EarlyData(EarlyDataIndication::Indication))).is_some();
    let mut early_data_accepted = false;
    let mut early_ikm: Option<Vec<u8>> = None;
    if let Some(ticket) = &accepted_ticket {
        let psk_params = tls_crypto::params_for(ticket.cipher_suite).map_err(map_crypto)?;
        let ikm = resumption_psk(&*psk_params.hkdf, &ticket.resumption_master_secret, &ticket.ticket_nonce).map_err(map_crypto)?;
        if !retried && early_data_requested {
            if let Some(identity) = offered_psk.and_then(|p| p.identities.first()) {
                if strikes.observe(&identity.identity, identity.obfuscated_ticket_age) {
                    early_data_accepted = true;
                }
            }
        }
        early_ikm = Some(ikm);
    }

    record.install_aead(tls_crypto::params_for(cipher_suite).map_err(map_crypto)?.aead);

    if early_data_accepted {
        if let Some(ikm) = &early_ikm {
            let early_schedule = KeySchedule::new(clone_hkdf(&*params.hkdf), Some(ikm));
            let mut ch1_only = TranscriptHash::new(params.hkdf.boxed_hash());
            ch1_only.append(&ch1_bytes);
            let early_secret = early_schedule.client_early_traffic_secret(&ch1_only.current_hash()).map_err(map_crypto)?;
            config.key_log.log(KeyLogLabel::ClientEarlyTrafficSecret, &ch1.random, &early_secret);
            let (key, iv) = early_schedule.traffic_key_and_iv(&early_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
            record.set_read_keys(key, iv);
        }
    }

    let dhe_shared = crypto.key_exchange.generate(offer.group, crypto.rng).map_err(map_crypto)?;
    let (server_secret, server_public) = dhe_shared;
    let dhe_shared_secret = server_secret.agree(&peer_public).map_err(map_crypto)?;

    let mut key_schedule = match &early_ikm {
        Some(ikm) if accepted_ticket.is_some() => KeySchedule::new(clone_hkdf(&*params.hkdf), Some(ikm)),
        _ => KeySchedule::new(clone_hkdf(&*params.hkdf), None),
    };
    let resuming = accepted_ticket.is_some();
    key_schedule.derive_handshake_secret(&dhe_shared_secret).map_err(map_crypto)?;

    let mut server_random = [0_u8; 32];
    crypto.rng.fill(&mut server_random).map_err(map_crypto)?;

    let mut sh_extensions = vec![
        Extension::SupportedVersionsServerHello(0x0304),
        Extension::KeyShareServerHello(KeyShareServerHello(KeyShareEntry { group: offer.group, key_exchange: server_public })),
    ];
    if resuming {
        sh_extensions.push(Extension::PreSharedKeyServerHello(PreSharedKeyServerHello { selected_identity: 0 }));
    }
    let server_hello = ServerHello {
        legacy_version: LEGACY_VERSION,
        random: server_random,
        legacy_session_id_echo: client_hello.legacy_session_id.clone(),
        cipher_suite,
        extensions: sh_extensions,
    };
    let mut sh_bytes = Vec::new();
    HandshakeMessage::ServerHello(server_hello).write_to(&mut sh_bytes)?;
    record.write_handshake(&sh_bytes)?;
    transcript.append(&sh_bytes);

    let sh_hash = transcript.current_hash();
    let client_hs_secret = key_schedule.client_handshake_traffic_secret(&sh_hash).map_err(map_crypto)?;
    let server_hs_secret = key_schedule.server_handshake_traffic_secret(&sh_hash).map_err(map_crypto)?;
    config.key_log.log(KeyLogLabel::ClientHandshakeTrafficSecret, &client_hello.random, &client_hs_secret);
    config.key_log.log(KeyLogLabel::ServerHandshakeTrafficSecret, &client_hello.random, &server_hs_secret);

    let (server_hs_key, server_hs_iv) = key_schedule.traffic_key_and_iv(&server_hs_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_write_keys(server_hs_key, server_hs_iv);

    // --- WAIT_EOED: drain 0-RTT application data under early traffic keys ---
    let mut early_data_buffer = Vec::new();
    if early_data_accepted {
        loop {
            match record.recv_next()? {
                Incoming::ApplicationData(data) => early_data_buffer.extend_from_slice(&data),
                Incoming::Handshake(bytes) => {
                    match HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&bytes), params.hkdf.hash().output_len())? {
                        HandshakeMessage::EndOfEarlyData => {
                            transcript.append(&bytes);
                            break;
                        }
                        _ => return Err(HandshakeError::UnexpectedMessage { expected: "application data or EndOfEarlyData", state: "WaitEndOfEarlyData" }),
                    }
                }
                Incoming::Alert(alert) => return Err(HandshakeError::PeerAlert(alert.description)),
            }
        }
    }
    let (client_hs_key, client_hs_iv) = key_schedule.traffic_key_and_iv(&client_hs_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_read_keys(client_hs_key, client_hs_iv);

    // --- EncryptedExtensions ---
    let alpn = negotiate_alpn(config, &client_hello.extensions);
    let mut ee_extensions = Vec::new();
    if let Some(proto) = &alpn {
        ee_extensions.push(Extension::Alpn(AlpnProtocols::Selected(proto.clone())));
    }
    if early_data_accepted {
        ee_extensions.push(Extension::EarlyData(EarlyDataIndication::Indication));
    }
    if let Some(limit) = config.record_size_limit {
        if let Ok(limit) = RecordSizeLimit::new(limit) {
            ee_extensions.push(Extension::RecordSizeLimit(limit));
        }
    }
    if let Some(client_limit) = find_extension(&client_hello.extensions, |e| match e {
        Extension::RecordSizeLimit(limit) => Some(limit.get()),
        _ => None,
    }) {
        record.set_peer_record_size_limit(client_limit as usize);
    }
    let ee = EncryptedExtensions { extensions: ee_extensions };
    let mut ee_bytes = Vec::new();
    HandshakeMessage::EncryptedExtensions(ee).write_to(&mut ee_bytes)?;
    record.write_handshake(&ee_bytes)?;
    transcript.append(&ee_bytes);

    // --- Server authentication (skipped when resuming) ---
    let mut signature_scheme = None;
    if !resuming {
        let chain = cert.chain_bytes();
        let certificate = Certificate {
            certificate_request_context: Vec::new(),
            entries: chain.iter().map(|c| CertificateEntry { cert_data: c.clone(), extensions: Vec::new() }).collect(),
        };
        let mut cert_bytes = Vec::new();
        HandshakeMessage::Certificate(certificate).write_to(&mut cert_bytes)?;
        record.write_handshake(&cert_bytes)?;
        transcript.append(&cert_bytes);

        let scheme = cert.signature_scheme();
        let peer_schemes = find_extension(&client_hello.extensions, |e| match e {
            Extension::SignatureAlgorithms(list) => Some(list),
            _ => None,
        });
        if !peer_schemes.is_some_and(|list| list.schemes.contains(&scheme)) {
            return Err(HandshakeError::NoCommonSigAlg);
        }

        let content = certificate_verify_content(SERVER_CERTIFICATE_VERIFY_CONTEXT, &transcript.current_hash());
        let signature = cert.sign(&content)?;
        let cv = HandshakeMessage::CertificateVerify(tls_wire::handshake::CertificateVerify { algorithm: scheme, signature });
        let mut cv_bytes = Vec::new();
        cv.write_to(&mut cv_bytes)?;
        record.write_handshake(&cv_bytes)?;
        transcript.append(&cv_bytes);
        signature_scheme = Some(scheme);
    }

    // --- Server Finished ---
    let server_finished_key = key_schedule.finished_key(&server_hs_secret).map_err(map_crypto)?;
    let server_verify_data = tls_crypto::finished_mac(&*params.hkdf, &server_finished_key, &transcript.current_hash());
    let server_finished = HandshakeMessage::Finished(tls_wire::handshake::Finished { verify_data: server_verify_data });
    let mut server_finished_bytes = Vec::new();
    server_finished.write_to(&mut server_finished_bytes)?;
    record.write_handshake(&server_finished_bytes)?;
    transcript.append(&server_finished_bytes);
    // RFC 8446 §7.1: ap-traffic/exporter secrets come from the transcript
    // through server Finished only — capture it before client Finished.
    let server_finished_hash = transcript.current_hash();

    key_schedule.derive_master_secret().map_err(map_crypto)?;
    let client_ap_secret = key_schedule.client_application_traffic_secret_0(&server_finished_hash).map_err(map_crypto)?;
    let server_ap_secret = key_schedule.server_application_traffic_secret_0(&server_finished_hash).map_err(map_crypto)?;
    let exporter_master_secret = key_schedule.exporter_master_secret(&server_finished_hash).map_err(map_crypto)?;
    config.key_log.log(KeyLogLabel::ClientTrafficSecret0, &client_hello.random, &client_ap_secret);
    config.key_log.log(KeyLogLabel::ServerTrafficSecret0, &client_hello.random, &server_ap_secret);
    config.key_log.log(KeyLogLabel::ExporterSecret, &client_hello.random, &exporter_master_secret);

    let (server_ap_key, server_ap_iv) = key_schedule.traffic_key_and_iv(&server_ap_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_write_keys(server_ap_key, server_ap_iv);

    // --- WAIT_FLIGHT2 / WAIT_FINISHED: client's Finished ---
    let client_fin_bytes = expect_handshake(&mut record)?;
    let client_finished = match HandshakeMessage::read_from(&mut tls_wire::codec::Reader::new(&client_fin_bytes), params.hkdf.hash().output_len())? {
        HandshakeMessage::Finished(f) => f,
        _ => return Err(HandshakeError::UnexpectedMessage { expected: "Finished", state: "WaitFinished" }),
    };
    let client_finished_key = key_schedule.finished_key(&client_hs_secret).map_err(map_crypto)?;
    let expected = tls_crypto::finished_mac(&*params.hkdf, &client_finished_key, &transcript.current_hash());
    if !fixed_time_eq(&expected, &client_finished.verify_data) {
        return Err(HandshakeError::FinishedMismatch);
    }
    transcript.append(&client_fin_bytes);

    let resumption_master_secret = key_schedule.resumption_master_secret(&transcript.current_hash()).map_err(map_crypto)?;

    let (client_ap_key, client_ap_iv) = key_schedule.traffic_key_and_iv(&client_ap_secret, params.key_len, params.iv_len).map_err(map_crypto)?;
    record.set_read_keys(client_ap_key, client_ap_iv);

    Ok(ServerConnection {
        record,
        negotiated: NegotiatedParams {
            cipher_suite,
            group: offer.group,
            signature_scheme,
            alpn,
            server_name: find_extension(&client_hello.extensions, |e| match e {
                Extension::ServerName(list) => list.primary_host_name().map(str::to_owned),
                _ => None,
            }),
        },
        client_random: client_hello.random,
        finished_len: params.hkdf.hash().output_len(),
        exporter_master_secret,
        resumption_master_secret,
        early_data_accepted,
        early_data: early_data_buffer,
        client_app_traffic_secret: client_ap_secret,
        server_app_traffic_secret: server_ap_secret,
    })
}

fn negotiate_alpn(config: &ServerConfig, client_extensions: &[Extension]) -> Option<Vec<u8>> {
    let offered = find_extension(client_extensions, |e| match e {
        Extension::Alpn(AlpnProtocols::Offered(list)) => Some(list),
        _ => None,
    })?;
    config.alpn_protocols.iter().find(|p| offered.contains(p)).cloned()
}
