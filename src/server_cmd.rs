//! Drives `tls13ep server`: accept one TCP connection, run the server
//! state machine to completion, drain any 0-RTT data, optionally reply,
//! issue a resumption ticket, and print the negotiated parameters.

use tls_crypto::{RingCsprng, RingKeyExchange, RingVerifier};
use tls_handshake::error::Result;
use tls_handshake::server::{self, NoPsks, ServerConfig};
use tls_handshake::ticket::{StrikeRegister, Ticket};
use tls_handshake::CryptoProviders;

use crate::identity::LoadedIdentity;
use crate::options::ServerOptions;
use crate::tickets::FileBackedPskStore;
use crate::{connect, keylogfile, tickets};

pub struct ServerOutcome {
    pub negotiated: tls_handshake::NegotiatedParams,
    pub early_data: Vec<u8>,
    pub issued_ticket: Option<Ticket>,
}

pub fn run(options: &ServerOptions, key_log_file: Option<&str>) -> Result<ServerOutcome> {
    let psk_store_file = options.ticket_store.as_deref();
    let identity = LoadedIdentity::load(&options.cert_file, &options.key_file)?;

    let mut config = ServerConfig { key_log: keylogfile::open(key_log_file)?, ..ServerConfig::default() };
    config.alpn_protocols = options.alpn_protocols.clone();
    config.record_size_limit = options.record_size_limit;

    let transport = connect::accept_one(&options.listen)?;

    let rng = RingCsprng::new();
    let key_exchange = RingKeyExchange;
    let verifier = RingVerifier;
    let crypto = CryptoProviders { rng: &rng, key_exchange: &key_exchange, signature_verifier: &verifier };

    let mut strikes = StrikeRegister::new();

    let mut connection = match psk_store_file {
        Some(path) => {
            let psk_store = FileBackedPskStore::load(path)?;
            server::accept(transport, &config, &crypto, &identity, &psk_store, &mut strikes)?
        }
        None => server::accept(transport, &config, &crypto, &identity, &NoPsks, &mut strikes)?,
    };

    let negotiated = connection.negotiated().clone();
    let early_data = connection.take_early_data();

    if let Some(text) = &options.reply {
        connection.write(text.as_bytes())?;
    }

    let issued_ticket = if options.ticket_lifetime > 0 {
        let ticket = connection.issue_ticket(&rng, options.ticket_lifetime, b"\x01")?;
        if let Some(path) = psk_store_file {
            tickets::append(path, &ticket)?;
        }
        Some(ticket)
    } else {
        None
    };

    connection.close()?;

    Ok(ServerOutcome { negotiated, early_data, issued_ticket })
}
