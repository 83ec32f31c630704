//! End-to-end client/server handshake scenarios, driven over real loopback
//! TCP sockets (one thread per side) rather than mocked I/O, the same way
//! `dns-transport`'s own integration tests exercise a transport against a
//! live listener rather than stubbing `Read`/`Write`.

use std::net::{TcpListener, TcpStream};
use std::thread;

use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use tls_crypto::{RingCsprng, RingKeyExchange, RingVerifier, SigningKey};
use tls_handshake::cert::{CertificateProvider, InsecureAcceptAnyCertificate};
use tls_handshake::client::{self, ClientConfig};
use tls_handshake::error::Result;
use tls_handshake::server::{self, NoPsks, PskStore, ServerConfig};
use tls_handshake::ticket::{StrikeRegister, Ticket};
use tls_handshake::CryptoProviders;
use tls_wire::SignatureScheme;

/// A test-only identity: an ephemeral ECDSA P-256 key, with the "chain"
/// being just the raw `SubjectPublicKeyInfo` `InsecureAcceptAnyCertificate`
/// expects rather than an encoded X.509 certificate.
struct TestIdentity {
    chain: Vec<Vec<u8>>,
    key: SigningKey,
}

impl TestIdentity {
    fn generate() -> Self {
        let rng = ring::rand::SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref()).unwrap();
        let public_key = pair.public_key().as_ref().to_vec();
        let key = SigningKey::from_pkcs8_ecdsa_p256(pkcs8.as_ref()).unwrap();
        Self { chain: vec![public_key], key }
    }
}

impl CertificateProvider for TestIdentity {
    fn chain_bytes(&self) -> &[Vec<u8>] {
        &self.chain
    }

    fn signature_scheme(&self) -> SignatureScheme {
        SignatureScheme::EcdsaSecp256r1Sha256
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        use tls_crypto::provider::Signer;
        self.key.sign(SignatureScheme::EcdsaSecp256r1Sha256, data).map_err(tls_handshake::HandshakeError::from)
    }
}

struct OneTicketStore(Option<Ticket>);

impl PskStore for OneTicketStore {
    fn find(&self, identity: &[u8]) -> Option<Ticket> {
        self.0.as_ref().filter(|t| t.ticket == identity).cloned()
    }
}

fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (client.join().unwrap(), server)
}

#[test]
fn full_ecdhe_handshake_exchanges_application_data() {
    let (client_sock, server_sock) = loopback_pair();
    let identity = TestIdentity::generate();

    let server_thread = thread::spawn(move || {
        let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
        let mut strikes = StrikeRegister::default();
        let mut conn = server::accept(server_sock, &ServerConfig::default(), &crypto, &identity, &NoPsks, &mut strikes).unwrap();
        assert_eq!(conn.read().unwrap(), b"hello from client");
        conn.write(b"hello from server").unwrap();
        conn.close().unwrap();
        conn.negotiated().clone()
    });

    let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
    let mut conn = client::connect(client_sock, &ClientConfig::default(), &crypto, &InsecureAcceptAnyCertificate).unwrap();
    conn.write(b"hello from client").unwrap();
    assert_eq!(conn.read().unwrap(), b"hello from server");
    conn.close().unwrap();

    let server_negotiated = server_thread.join().unwrap();
    assert_eq!(conn.negotiated().cipher_suite, server_negotiated.cipher_suite);
    assert_eq!(conn.negotiated().group, server_negotiated.group);
    assert_eq!(conn.negotiated().signature_scheme, Some(SignatureScheme::EcdsaSecp256r1Sha256));
}

#[test]
fn hello_retry_request_when_no_common_key_share() {
    let (client_sock, server_sock) = loopback_pair();
    let identity = TestIdentity::generate();

    let server_thread = thread::spawn(move || {
        let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
        let mut strikes = StrikeRegister::default();
        let config = ServerConfig { supported_groups: vec![tls_wire::NamedGroup::Secp256r1], ..ServerConfig::default() };
        let mut conn = server::accept(server_sock, &config, &crypto, &identity, &NoPsks, &mut strikes).unwrap();
        conn.close().unwrap();
        conn.negotiated().clone()
    });

    // client's first key_share is for X25519 (the first of its default
    // supported_groups); the server above only accepts Secp256r1, which
    // the client does list in supported_groups but hasn't sent a key_share
    // for yet — forcing a HelloRetryRequest round trip.
    let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
    let config = ClientConfig { supported_groups: vec![tls_wire::NamedGroup::X25519, tls_wire::NamedGroup::Secp256r1], ..ClientConfig::default() };
    let mut conn = client::connect(client_sock, &config, &crypto, &InsecureAcceptAnyCertificate).unwrap();
    conn.close().unwrap();

    let server_negotiated = server_thread.join().unwrap();
    assert_eq!(conn.negotiated().group, tls_wire::NamedGroup::Secp256r1);
    assert_eq!(server_negotiated.group, tls_wire::NamedGroup::Secp256r1);
}

#[test]
fn psk_resumption_with_accepted_early_data() {
    let identity_for_initial = TestIdentity::generate();

    // First connection: full handshake, server issues a ticket.
    let (client_sock, server_sock) = loopback_pair();
    let server_thread = thread::spawn(move || {
        let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
        let mut strikes = StrikeRegister::default();
        let mut conn = server::accept(server_sock, &ServerConfig::default(), &crypto, &identity_for_initial, &NoPsks, &mut strikes).unwrap();
        let rng = RingCsprng::new();
        let ticket = conn.issue_ticket(&rng, 3600, b"\x01").unwrap();
        conn.close().unwrap();
        ticket
    });

    let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
    let mut conn = client::connect(client_sock, &ClientConfig::default(), &crypto, &InsecureAcceptAnyCertificate).unwrap();
    conn.close().unwrap();
    let _ = conn.take_tickets(); // NewSessionTicket arrives post-handshake on a live read in real use; here the server sends it before close.

    let ticket = server_thread.join().unwrap();

    // Second connection: present the ticket as a PSK with 0-RTT data.
    let identity_for_resumption = TestIdentity::generate();
    let (client_sock2, server_sock2) = loopback_pair();
    let psk_store = OneTicketStore(Some(ticket.clone()));
    let server_thread2 = thread::spawn(move || {
        let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
        let mut strikes = StrikeRegister::default();
        let mut conn = server::accept(server_sock2, &ServerConfig::default(), &crypto, &identity_for_resumption, &psk_store, &mut strikes).unwrap();
        let early_data = conn.take_early_data();
        let accepted = conn.early_data_accepted();
        conn.close().unwrap();
        (accepted, early_data)
    });

    let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
    let config = ClientConfig { psk: Some(ticket), early_data: Some(b"0-RTT payload".to_vec()), ..ClientConfig::default() };
    let mut conn = client::connect(client_sock2, &config, &crypto, &InsecureAcceptAnyCertificate).unwrap();
    conn.close().unwrap();

    let (server_accepted, server_early_data) = server_thread2.join().unwrap();
    assert!(conn.early_data_accepted());
    assert!(server_accepted);
    assert_eq!(server_early_data, b"0-RTT payload");
}

#[test]
fn record_size_limit_fragments_large_application_data() {
    let (client_sock, server_sock) = loopback_pair();
    let identity = TestIdentity::generate();
    let payload = vec![0x5a_u8; 4096];
    let expected = payload.clone();

    let server_thread = thread::spawn(move || {
        let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
        let mut strikes = StrikeRegister::default();
        let config = ServerConfig { record_size_limit: Some(64), ..ServerConfig::default() };
        let mut conn = server::accept(server_sock, &config, &crypto, &identity, &NoPsks, &mut strikes).unwrap();
        let received = conn.read().unwrap();
        conn.close().unwrap();
        received
    });

    let crypto = CryptoProviders { rng: &RingCsprng::new(), key_exchange: &RingKeyExchange, signature_verifier: &RingVerifier };
    let config = ClientConfig { record_size_limit: Some(64), ..ClientConfig::default() };
    let mut conn = client::connect(client_sock, &config, &crypto, &InsecureAcceptAnyCertificate).unwrap();
    conn.write(&payload).unwrap();
    conn.close().unwrap();

    assert_eq!(server_thread.join().unwrap(), expected);
}
