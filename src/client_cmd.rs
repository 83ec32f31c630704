//! Drives `tls13ep client`: open a TCP connection, run the client state
//! machine to completion, optionally exchange one round of application
//! data, and print the negotiated parameters.

use tls_crypto::{RingCsprng, RingKeyExchange, RingVerifier};
use tls_handshake::client::{self, ClientConfig};
use tls_handshake::error::{HandshakeError, Result};
use tls_handshake::ticket::Ticket;
use tls_handshake::CryptoProviders;

use crate::identity::TrustEveryoneVerifier;
use crate::options::ClientOptions;
use crate::{connect, keylogfile, tickets};

/// Everything a completed client handshake leaves worth reporting: the
/// pieces [`crate::summary`] turns into the printed/JSON summary.
pub struct ClientOutcome {
    pub negotiated: tls_handshake::NegotiatedParams,
    pub early_data_accepted: bool,
    pub reply: Option<Vec<u8>>,
    pub new_tickets: usize,
}

pub fn run(options: &ClientOptions, key_log_file: Option<&str>) -> Result<ClientOutcome> {
    let server_name = options.server_name.clone().or_else(|| host_part(&options.connect));

    let psk = match &options.ticket_file {
        Some(path) => tickets::load_one(path)?,
        None => None,
    };

    let mut config = ClientConfig { server_name, key_log: keylogfile::open(key_log_file)?, ..ClientConfig::default() };
    config.alpn_protocols = options.alpn_protocols.clone();
    config.record_size_limit = options.record_size_limit;
    config.psk = psk;
    config.early_data = options.early_data.clone();

    if !options.insecure {
        log::error!("refusing to connect without --insecure: this binary has no X.509/PKI verifier wired up");
        return Err(HandshakeError::MissingExtension("--insecure required (no certificate verifier configured)"));
    }

    let transport = connect::connect(&options.connect).map_err(HandshakeError::from)?;

    let rng = RingCsprng::new();
    let key_exchange = RingKeyExchange;
    let verifier = RingVerifier;
    let crypto = CryptoProviders { rng: &rng, key_exchange: &key_exchange, signature_verifier: &verifier };

    let mut connection = client::connect(transport, &config, &crypto, &TrustEveryoneVerifier)?;
    let negotiated = connection.negotiated().clone();
    let early_data_accepted = connection.early_data_accepted();

    let reply = match &options.send {
        Some(text) => {
            connection.write(text.as_bytes())?;
            Some(connection.read()?)
        }
        None => None,
    };

    let pending = connection.take_tickets();
    let new_tickets = pending.len();
    if let Some(path) = &options.ticket_file {
        for ticket in &pending {
            tickets::append(path, ticket)?;
        }
    }
    log_accepted_tickets(&pending);

    connection.close()?;

    Ok(ClientOutcome { negotiated, early_data_accepted, reply, new_tickets })
}

fn log_accepted_tickets(tickets: &[Ticket]) {
    for ticket in tickets {
        log::info!("received NewSessionTicket, lifetime {}s", ticket.lifetime_seconds);
    }
}

fn host_part(connect: &str) -> Option<String> {
    connect.rsplit_once(':').map(|(host, _port)| host.to_owned())
}
